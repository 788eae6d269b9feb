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

//! Portcullis Common Types
//!
//! This crate defines the types that cross the boundary between the Portcullis
//! networking core and the game application sitting on top of it:
//! - Connection descriptors ([`ConnectionInfo`], [`ConnectionState`])
//! - Negotiated client capabilities ([`ClientCapabilities`])
//! - Inbound and outbound application events ([`InboundEvent`], [`OutboundEvent`])
//!
//! Everything here is serializable so a game server running in another process
//! can consume the same events.

pub mod capabilities;
pub mod connection;
pub mod event;

pub use capabilities::ClientCapabilities;
pub use connection::{ConnectionInfo, ConnectionState, ProtocolType};
pub use event::{InboundEvent, OutboundEvent};
