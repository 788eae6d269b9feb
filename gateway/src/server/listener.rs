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

//! A single bound listener and its accept loop

use crate::context::ServerContext;
use crate::error::NetworkError;
use crate::registry::ConnectionHandle;
use crate::session::{Connection, ConnectionSession};
use portcullis_common::{ClientCapabilities, ProtocolType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so resource exhaustion does not spin the loop
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Configured listener, resolved but not yet bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerDefinition {
    /// Unique listener name
    pub name: String,

    /// Interface name the address was resolved from
    pub interface: String,

    pub bind_addr: SocketAddr,

    pub protocol: ProtocolType,

    /// TLS context name, if the listener is encrypted
    pub tls: Option<String>,
}

/// Listener bound to one address
///
/// Created unbound; [`ListenerServer::start`] binds the socket and spawns the
/// accept loop, [`ListenerServer::stop`] ends it. Sessions already accepted
/// keep running until they close on their own.
pub struct ListenerServer {
    definition: ListenerDefinition,
    context: ServerContext,
    tls: Option<TlsAcceptor>,
    local_addr: Option<SocketAddr>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerServer {
    pub fn new(
        definition: ListenerDefinition,
        context: ServerContext,
        tls: Option<TlsAcceptor>,
    ) -> Self {
        Self {
            definition,
            context,
            tls,
            local_addr: None,
            shutdown: None,
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ListenerDefinition {
        &self.definition
    }

    /// Bound address while running; reflects the real port when configured with 0
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Bind and start accepting connections
    pub async fn start(&mut self) -> Result<SocketAddr, NetworkError> {
        if let Some(addr) = self.local_addr {
            return Ok(addr);
        }

        let bind_error = |source| NetworkError::Bind {
            name: self.definition.name.clone(),
            addr: self.definition.bind_addr,
            source,
        };
        let listener = TcpListener::bind(self.definition.bind_addr)
            .await
            .map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        let acceptor = Arc::new(Acceptor {
            name: self.definition.name.clone(),
            protocol: self.definition.protocol,
            tls: self.tls.clone(),
            context: self.context.clone(),
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        self.task = Some(tokio::spawn(acceptor.run(listener, shutdown_rx)));
        self.shutdown = Some(shutdown_tx);
        self.local_addr = Some(local_addr);

        info!(
            listener = %self.definition.name,
            addr = %local_addr,
            protocol = %self.definition.protocol,
            tls = self.tls.is_some(),
            "Listener started"
        );
        Ok(local_addr)
    }

    /// Stop accepting; open sessions are left to close on their own
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(listener = %self.definition.name, error = %e, "Accept loop panicked");
            }
        }
        if self.local_addr.take().is_some() {
            info!(listener = %self.definition.name, "Listener stopped");
        }
    }
}

/// State shared by the accept loop and the connection tasks it spawns
struct Acceptor {
    name: String,
    protocol: ProtocolType,
    tls: Option<TlsAcceptor>,
    context: ServerContext,
}

impl Acceptor {
    async fn run(self: Arc<Self>, listener: TcpListener, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((socket, remote_addr)) => {
                        debug!(listener = %self.name, remote = %remote_addr, "Accepted connection");
                        let acceptor = Arc::clone(&self);
                        tokio::spawn(async move { acceptor.handle(socket, remote_addr).await });
                    }
                    Err(e) => {
                        error!(listener = %self.name, error = %e, "Error accepting connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
            }
        }
    }

    async fn handle(&self, socket: TcpStream, remote_addr: SocketAddr) {
        if let Err(e) = socket.set_nodelay(true) {
            debug!(listener = %self.name, remote = %remote_addr, error = %e, "Failed to set TCP_NODELAY");
        }

        match &self.tls {
            Some(tls) => match tls.accept(socket).await {
                Ok(stream) => self.serve(stream, remote_addr, true).await,
                Err(e) => {
                    warn!(listener = %self.name, remote = %remote_addr, error = %e, "TLS handshake failed");
                }
            },
            None => self.serve(socket, remote_addr, false).await,
        }
    }

    async fn serve<S>(&self, stream: S, remote_addr: SocketAddr, tls: bool)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let queue_size = self.context.settings().outbound_queue_size.max(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(queue_size);
        let (capabilities_tx, capabilities_rx) = watch::channel(ClientCapabilities::default());
        let registry = self.context.connection_registry();

        let connection = registry
            .register(|id| {
                let connection =
                    Connection::new(id, self.name.clone(), self.protocol, remote_addr, tls);
                let info = connection.info(&capabilities_rx.borrow());
                let handle = ConnectionHandle::new(info, capabilities_rx, outbound_tx);
                (handle, connection)
            })
            .await;

        let session = ConnectionSession::new(connection, &self.context, outbound_rx, capabilities_tx);
        let connection = session.run(stream).await;
        registry.unregister(connection.id()).await;
    }
}
