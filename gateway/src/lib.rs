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

//! Portcullis Gateway Library
//!
//! This library provides the telnet networking core of the Portcullis server:
//! listeners, per-connection sessions, option negotiation and MCCP
//! compression. The game itself lives behind two channels carrying
//! [`portcullis_common::InboundEvent`] and [`portcullis_common::OutboundEvent`].

pub mod compression;
pub mod config;
pub mod context;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;
pub mod telnet;

// Re-export commonly used types
pub use compression::{CompressionPipeline, Direction};
pub use context::ServerContext;
pub use error::{CompressionError, ConfigError, NetworkError, TelnetError};
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use server::{ListenerServer, NetworkService};
pub use session::{Connection, ConnectionSession};
