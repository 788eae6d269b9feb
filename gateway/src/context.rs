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

use crate::config::TelnetSettings;
use crate::registry::ConnectionRegistry;
use crate::telnet::options::OptionRegistry;
use portcullis_common::InboundEvent;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared resources handed to every listener and session
#[derive(Clone)]
pub struct ServerContext {
    /// Active connections
    pub connection_registry: Arc<ConnectionRegistry>,

    /// Option handlers instantiated for each new connection
    pub option_registry: Arc<OptionRegistry>,

    /// Per-connection telnet settings
    pub settings: Arc<TelnetSettings>,

    /// Channel to the application
    pub inbound: mpsc::UnboundedSender<InboundEvent>,
}

impl ServerContext {
    /// Create a new server context
    pub fn new(
        connection_registry: Arc<ConnectionRegistry>,
        option_registry: OptionRegistry,
        settings: TelnetSettings,
        inbound: mpsc::UnboundedSender<InboundEvent>,
    ) -> Self {
        Self {
            connection_registry,
            option_registry: Arc::new(option_registry),
            settings: Arc::new(settings),
            inbound,
        }
    }

    /// Get the connection registry
    pub fn connection_registry(&self) -> &Arc<ConnectionRegistry> {
        &self.connection_registry
    }

    /// Get the option registry
    pub fn option_registry(&self) -> &Arc<OptionRegistry> {
        &self.option_registry
    }

    /// Get the telnet settings
    pub fn settings(&self) -> &Arc<TelnetSettings> {
        &self.settings
    }

    /// Get a sender for application events
    pub fn inbound(&self) -> &mpsc::UnboundedSender<InboundEvent> {
        &self.inbound
    }
}
