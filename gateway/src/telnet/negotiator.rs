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

//! Per-connection option negotiation
//!
//! Tracks the two sides of every registered option separately and answers
//! WILL/WONT/DO/DONT so that no request is ever acknowledged twice and no
//! acknowledgment starts a loop.

use crate::telnet::options::{Advertise, Effect, OptionContext, OptionHandler, OptionRegistry};
use crate::telnet::protocol::{TelnetCommand, build_command, build_negotiation};
use portcullis_common::ClientCapabilities;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Negotiation state of one side of an option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideState {
    /// Option is in effect on this side
    pub enabled: bool,

    /// We sent a request for this side and await the answer
    pub negotiating: bool,
}

/// Negotiation state of one option
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionState {
    /// Server side: we WILL, the client says DO
    pub local: SideState,

    /// Client side: the client WILLs, we say DO
    pub remote: SideState,
}

struct Entry {
    handler: Box<dyn OptionHandler>,
    state: OptionState,
}

/// Drives negotiation for every registered option of one connection
pub struct OptionNegotiator {
    entries: BTreeMap<u8, Entry>,
}

impl OptionNegotiator {
    /// Create a negotiator with fresh handlers from `registry`
    pub fn new(registry: &OptionRegistry) -> Self {
        let entries = registry
            .instantiate()
            .into_iter()
            .map(|(option, handler)| {
                (
                    option,
                    Entry {
                        handler,
                        state: OptionState::default(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Current state of `option`, if a handler is registered for it
    pub fn state(&self, option: u8) -> Option<OptionState> {
        self.entries.get(&option).map(|entry| entry.state)
    }

    /// Whether the server side of `option` is on
    pub fn is_enabled_local(&self, option: u8) -> bool {
        self.state(option).is_some_and(|state| state.local.enabled)
    }

    /// Whether the client side of `option` is on
    pub fn is_enabled_remote(&self, option: u8) -> bool {
        self.state(option).is_some_and(|state| state.remote.enabled)
    }

    /// Send the opening offers: WILL for local handlers, DO for remote ones
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for (&option, entry) in self.entries.iter_mut() {
            let verb = match entry.handler.advertise() {
                Advertise::Will => {
                    entry.state.local.negotiating = true;
                    TelnetCommand::WILL
                }
                Advertise::Do => {
                    entry.state.remote.negotiating = true;
                    TelnetCommand::DO
                }
                Advertise::None => continue,
            };
            trace!(option = entry.handler.name(), ?verb, "Offering option");
            effects.push(Effect::Send(build_negotiation(verb, option)));
        }
        effects
    }

    /// Answer a two-byte command
    pub fn receive_command(&mut self, command: TelnetCommand) -> Vec<Effect> {
        match command {
            TelnetCommand::AYT => vec![Effect::Send(build_command(TelnetCommand::NOP))],
            other => {
                trace!(command = ?other, "Ignoring telnet command");
                Vec::new()
            }
        }
    }

    /// Handle `IAC <verb> <option>` from the client
    pub fn receive(
        &mut self,
        verb: TelnetCommand,
        option: u8,
        capabilities: &mut ClientCapabilities,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(entry) = self.entries.get_mut(&option) else {
            match verb {
                TelnetCommand::DO => {
                    debug!(option, "Refusing DO for unsupported option");
                    effects.push(Effect::Send(build_negotiation(TelnetCommand::WONT, option)));
                }
                TelnetCommand::WILL => {
                    debug!(option, "Refusing WILL for unsupported option");
                    effects.push(Effect::Send(build_negotiation(TelnetCommand::DONT, option)));
                }
                _ => {}
            }
            return effects;
        };

        let name = entry.handler.name();
        let state = &mut entry.state;
        let mut ctx = OptionContext::new(capabilities, &mut effects);
        match verb {
            TelnetCommand::WILL => {
                if state.remote.negotiating {
                    state.remote.negotiating = false;
                    state.remote.enabled = true;
                    debug!(option = name, "Client enabled option");
                    entry.handler.enable_remote(&mut ctx);
                } else if state.remote.enabled {
                    trace!(option = name, "Option already enabled by client");
                } else if entry.handler.supports_remote() {
                    state.remote.enabled = true;
                    ctx.send_negotiation(TelnetCommand::DO, option);
                    debug!(option = name, "Client offered option");
                    entry.handler.enable_remote(&mut ctx);
                } else {
                    ctx.send_negotiation(TelnetCommand::DONT, option);
                }
            }
            TelnetCommand::WONT => {
                if state.remote.negotiating {
                    state.remote.negotiating = false;
                    debug!(option = name, "Client refused option");
                    entry.handler.refused_remote(&mut ctx);
                } else if state.remote.enabled {
                    state.remote.enabled = false;
                    ctx.send_negotiation(TelnetCommand::DONT, option);
                    debug!(option = name, "Client disabled option");
                    entry.handler.disable_remote(&mut ctx);
                }
            }
            TelnetCommand::DO => {
                if state.local.negotiating {
                    state.local.negotiating = false;
                    state.local.enabled = true;
                    debug!(option = name, "Client accepted option");
                    entry.handler.enable_local(&mut ctx);
                } else if state.local.enabled {
                    trace!(option = name, "Option already enabled locally");
                } else if entry.handler.supports_local() {
                    state.local.enabled = true;
                    ctx.send_negotiation(TelnetCommand::WILL, option);
                    debug!(option = name, "Client requested option");
                    entry.handler.enable_local(&mut ctx);
                } else {
                    ctx.send_negotiation(TelnetCommand::WONT, option);
                }
            }
            TelnetCommand::DONT => {
                if state.local.negotiating {
                    state.local.negotiating = false;
                    debug!(option = name, "Client declined option");
                    entry.handler.refused_local(&mut ctx);
                } else if state.local.enabled {
                    state.local.enabled = false;
                    ctx.send_negotiation(TelnetCommand::WONT, option);
                    debug!(option = name, "Client turned option off");
                    entry.handler.disable_local(&mut ctx);
                }
            }
            other => {
                trace!(command = ?other, "Not a negotiation verb");
            }
        }
        effects
    }

    /// Route a subnegotiation payload to its handler
    pub fn receive_subnegotiation(
        &mut self,
        option: u8,
        payload: &[u8],
        capabilities: &mut ClientCapabilities,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.entries.get_mut(&option) {
            Some(entry) if entry.handler.accepts_subnegotiation() => {
                let mut ctx = OptionContext::new(capabilities, &mut effects);
                entry.handler.receive_subnegotiation(payload, &mut ctx);
            }
            _ => {
                trace!(option, len = payload.len(), "Dropping subnegotiation");
            }
        }
        effects
    }
}
