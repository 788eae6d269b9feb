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

//! Telnet protocol engine
//!
//! - [`protocol`]: command and option codes, frame builders, output escaping
//! - [`decoder`]: incremental byte stream decoder
//! - [`negotiator`]: per-connection option negotiation state machine
//! - [`options`]: option handlers (SGA, NAWS, TTYPE, MCCP2, MCCP3, MSSP)

pub mod decoder;
pub mod negotiator;
pub mod options;
pub mod protocol;

pub use decoder::{TelnetDecoder, TelnetEvent};
pub use negotiator::{OptionNegotiator, OptionState, SideState};
pub use options::{Effect, OptionHandler, OptionRegistry};
pub use protocol::{TelnetCommand, TelnetOption};
