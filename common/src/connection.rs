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

//! Connection descriptor types

use crate::capabilities::ClientCapabilities;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use uuid::Uuid;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Socket is open and the read loop is running
    Active,

    /// Socket has been closed; no further events will be produced
    Closed,
}

/// Wire protocol spoken by a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// RFC 854 Telnet with MUD extensions
    Telnet,
}

impl ProtocolType {
    /// Name used for this protocol in listener configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolType::Telnet => "telnet",
        }
    }
}

impl std::str::FromStr for ProtocolType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telnet" => Ok(ProtocolType::Telnet),
            other => Err(format!("Unknown protocol: {}", other)),
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a connection, handed to the application on connect and on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Unique connection identifier
    pub id: Uuid,

    /// Name of the listener that accepted the connection
    pub listener: String,

    /// Protocol spoken on the connection
    pub protocol: ProtocolType,

    /// Remote socket address
    pub remote_addr: SocketAddr,

    /// Whether the connection is wrapped in TLS
    pub tls: bool,

    /// Connection creation timestamp
    pub created_at: DateTime<Utc>,

    /// Capabilities negotiated so far
    pub capabilities: ClientCapabilities,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_type_from_str() {
        assert_eq!("telnet".parse::<ProtocolType>(), Ok(ProtocolType::Telnet));
        assert_eq!("TELNET".parse::<ProtocolType>(), Ok(ProtocolType::Telnet));
        assert!("websocket".parse::<ProtocolType>().is_err());
    }

    #[test]
    fn test_connection_info_serialization() {
        let info = ConnectionInfo {
            id: Uuid::new_v4(),
            listener: "telnet".to_string(),
            protocol: ProtocolType::Telnet,
            remote_addr: "127.0.0.1:50000".parse().unwrap(),
            tls: false,
            created_at: Utc::now(),
            capabilities: ClientCapabilities::default(),
        };

        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"protocol\":\"telnet\""));

        let decoded: ConnectionInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, info);
    }
}
