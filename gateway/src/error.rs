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

//! Error types for the gateway

use std::net::SocketAddr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while loading configuration or setting up listeners
///
/// Every variant is detected before any socket is bound.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to open config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for [`crate::config::Configuration`]
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Two listeners share a name
    #[error("Duplicate listener name: {0}")]
    DuplicateListener(String),

    /// A listener references a TLS context that was never loaded
    #[error("Listener {listener} references unknown TLS context: {context}")]
    UnknownTlsContext { listener: String, context: String },

    /// A listener names a protocol no listener implementation exists for
    #[error("Listener {listener} uses unknown protocol: {protocol}")]
    UnknownProtocol { listener: String, protocol: String },

    /// A listener names an interface that is neither configured nor an address
    #[error("Listener {listener} uses unknown interface: {interface}")]
    UnknownInterface { listener: String, interface: String },

    /// The telnet option list names an option with no handler
    #[error("Unknown telnet option: {0}")]
    UnknownOption(String),

    /// Low water mark above the high water mark
    #[error("Invalid watermarks: low {low} exceeds high {high}")]
    Watermarks { low: usize, high: usize },

    /// Per-connection outbound queue with no room for any event
    #[error("Outbound queue size must be at least 1")]
    QueueSize,

    /// Certificate or key material could not be loaded
    #[error("Failed to load TLS material from {path}: {reason}")]
    TlsMaterial { path: String, reason: String },
}

/// Errors raised by the network service at runtime
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Listener socket could not be bound
    #[error("Failed to bind listener {name} to {addr}: {source}")]
    Bind {
        name: String,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No listener with the given name
    #[error("Unknown listener: {0}")]
    UnknownListener(String),

    /// No active connection with the given ID
    #[error("Connection not found: {0}")]
    UnknownConnection(Uuid),

    /// Connection exists but its session is no longer accepting events
    #[error("Connection {0} is closed")]
    ConnectionClosed(Uuid),

    /// Session queue is full; the connection is not draining its output
    #[error("Connection {0} is not accepting output")]
    QueueFull(Uuid),
}

/// Errors from the MCCP compression transforms
#[derive(Debug, Error)]
pub enum CompressionError {
    /// Outgoing deflate stream failed
    #[error("Compression failed: {0}")]
    Compress(#[from] flate2::CompressError),

    /// Incoming inflate stream failed; fatal for the connection
    #[error("Decompression failed: {0}")]
    Decompress(#[from] flate2::DecompressError),
}

/// Errors that end a telnet session
#[derive(Debug, Error)]
pub enum TelnetError {
    /// Socket read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compression transform failed
    #[error(transparent)]
    Compression(#[from] CompressionError),
}
