//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Network service: named listeners plus the connection registry

use super::listener::{ListenerDefinition, ListenerServer};
use super::tls::load_tls_acceptor;
use crate::config::Configuration;
use crate::context::ServerContext;
use crate::error::{ConfigError, NetworkError};
use crate::registry::ConnectionRegistry;
use crate::telnet::options::{MsspStatus, OptionRegistry};
use portcullis_common::{ConnectionInfo, InboundEvent, OutboundEvent, ProtocolType};
use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use uuid::Uuid;

/// Interface names that resolve without configuration
const BUILTIN_INTERFACES: [(&str, IpAddr); 3] = [
    ("loopback", IpAddr::V4(Ipv4Addr::LOCALHOST)),
    ("internal", IpAddr::V4(Ipv4Addr::LOCALHOST)),
    ("external", IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
];

/// Owner of every listener and, through the registry, every connection
pub struct NetworkService {
    context: ServerContext,
    interfaces: BTreeMap<String, IpAddr>,
    tls_contexts: HashMap<String, TlsAcceptor>,
    listeners: Vec<ListenerServer>,
}

impl NetworkService {
    /// Service with the built-in interfaces and no listeners
    pub fn new(context: ServerContext) -> Self {
        Self {
            context,
            interfaces: BUILTIN_INTERFACES
                .iter()
                .map(|(name, ip)| (name.to_string(), *ip))
                .collect(),
            tls_contexts: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Build the service and every configured listener without binding anything
    pub fn setup(
        config: &Configuration,
        inbound: mpsc::UnboundedSender<InboundEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = Arc::new(ConnectionRegistry::new());
        let mssp = MsspStatus::new(config.mssp.name.clone(), config.mssp.extra.clone())
            .with_players(registry.counter());
        let options = OptionRegistry::from_names(config.telnet.options.as_slice(), mssp)?;
        let context = ServerContext::new(registry, options, config.telnet.clone(), inbound);

        let mut service = Self::new(context);
        for (name, address) in &config.interfaces {
            service.add_interface(name, address.to_ip());
        }
        for (name, tls) in &config.tls {
            service.add_tls_context(name, load_tls_acceptor(&tls.cert, &tls.key)?);
        }
        for listener in &config.listeners {
            service.create_listener(
                &listener.name,
                &listener.interface,
                *listener.port,
                &listener.protocol,
                listener.tls.context(),
            )?;
        }

        tracing::debug!(
            listeners = service.listeners.len(),
            options = ?service.context.option_registry().options(),
            "Network service configured"
        );
        Ok(service)
    }

    /// Define or override a named interface
    pub fn add_interface(&mut self, name: impl Into<String>, ip: IpAddr) {
        self.interfaces.insert(name.into(), ip);
    }

    pub fn add_tls_context(&mut self, name: impl Into<String>, acceptor: TlsAcceptor) {
        self.tls_contexts.insert(name.into(), acceptor);
    }

    /// Create an unbound listener
    ///
    /// `interface` is an interface name or a literal IP address; `tls` names
    /// a TLS context added earlier.
    pub fn create_listener(
        &mut self,
        name: &str,
        interface: &str,
        port: u16,
        protocol: &str,
        tls: Option<&str>,
    ) -> Result<(), ConfigError> {
        if self.listener(name).is_some() {
            return Err(ConfigError::DuplicateListener(name.to_string()));
        }

        let protocol: ProtocolType =
            protocol
                .parse()
                .map_err(|_| ConfigError::UnknownProtocol {
                    listener: name.to_string(),
                    protocol: protocol.to_string(),
                })?;

        let acceptor = match tls {
            Some(context) => Some(self.tls_contexts.get(context).cloned().ok_or_else(|| {
                ConfigError::UnknownTlsContext {
                    listener: name.to_string(),
                    context: context.to_string(),
                }
            })?),
            None => None,
        };

        let ip = self
            .resolve_interface(interface)
            .ok_or_else(|| ConfigError::UnknownInterface {
                listener: name.to_string(),
                interface: interface.to_string(),
            })?;

        let definition = ListenerDefinition {
            name: name.to_string(),
            interface: interface.to_string(),
            bind_addr: SocketAddr::new(ip, port),
            protocol,
            tls: tls.map(str::to_string),
        };
        tracing::debug!(listener = name, addr = %definition.bind_addr, "Listener created");
        self.listeners
            .push(ListenerServer::new(definition, self.context.clone(), acceptor));
        Ok(())
    }

    fn resolve_interface(&self, interface: &str) -> Option<IpAddr> {
        self.interfaces
            .get(interface)
            .copied()
            .or_else(|| interface.parse().ok())
    }

    /// Start every listener in creation order
    ///
    /// If one fails to bind, the ones already started are stopped again.
    pub async fn start(&mut self) -> Result<(), NetworkError> {
        for index in 0..self.listeners.len() {
            if let Err(e) = self.listeners[index].start().await {
                tracing::error!(error = %e, "Failed to start listener");
                for listener in &mut self.listeners[..index] {
                    listener.stop().await;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop accepting on every listener
    pub async fn stop(&mut self) {
        for listener in &mut self.listeners {
            listener.stop().await;
        }
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.context.connection_registry()
    }

    pub fn listener(&self, name: &str) -> Option<&ListenerServer> {
        self.listeners.iter().find(|listener| listener.name() == name)
    }

    pub fn listeners(&self) -> impl Iterator<Item = &ListenerServer> {
        self.listeners.iter()
    }

    /// Bound address of a running listener
    pub fn local_addr(&self, name: &str) -> Result<SocketAddr, NetworkError> {
        self.listener(name)
            .and_then(ListenerServer::local_addr)
            .ok_or_else(|| NetworkError::UnknownListener(name.to_string()))
    }

    /// Send an event to one connection, waiting while its queue is full
    pub async fn send(&self, id: Uuid, event: OutboundEvent) -> Result<(), NetworkError> {
        self.registry().send(id, event).await
    }

    /// Send an event to every connection with room for it; returns how many accepted it
    pub async fn broadcast(&self, event: OutboundEvent) -> usize {
        self.registry().broadcast(event).await
    }

    /// Forget a connection; its session closes once it notices
    pub async fn unregister(&self, id: Uuid) -> bool {
        self.registry().unregister(id).await
    }

    pub async fn connection_count(&self) -> usize {
        self.registry().connection_count().await
    }

    pub async fn connection(&self, id: Uuid) -> Option<ConnectionInfo> {
        self.registry().get(id).await
    }

    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.registry().connections().await
    }
}
