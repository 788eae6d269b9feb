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

//! Events exchanged between the networking core and the application
//!
//! Inbound events flow from a connection to the application. Outbound events
//! flow from the application to a single connection, addressed by its ID.

use crate::capabilities::ClientCapabilities;
use crate::connection::ConnectionInfo;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event delivered to the application
///
/// For any one connection, `Connect` is always delivered before any other
/// event and `Disconnect` is always the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEvent {
    /// A client connected
    Connect { connection: ConnectionInfo },

    /// A client entered a complete line
    Line { connection: Uuid, text: String },

    /// Negotiated capabilities changed (window size, terminal type, options)
    Update {
        connection: Uuid,
        capabilities: ClientCapabilities,
    },

    /// A client went away
    Disconnect { connection: Uuid, reason: String },
}

impl InboundEvent {
    /// ID of the connection this event belongs to
    pub fn connection_id(&self) -> Uuid {
        match self {
            InboundEvent::Connect { connection } => connection.id,
            InboundEvent::Line { connection, .. }
            | InboundEvent::Update { connection, .. }
            | InboundEvent::Disconnect { connection, .. } => *connection,
        }
    }
}

/// Event sent by the application to one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Raw text, written as-is after telnet escaping
    Text { text: String },

    /// Text followed by a line ending
    Line { text: String },

    /// Prompt text, followed by Go Ahead unless the client suppressed it
    Prompt { text: String },

    /// Out-of-band payload framed as a subnegotiation for `option`
    Oob { option: u8, payload: Vec<u8> },

    /// Close the connection after flushing pending output
    Close { reason: String },
}
