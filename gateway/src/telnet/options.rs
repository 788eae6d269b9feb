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

//! Telnet option handlers
//!
//! An [`OptionHandler`] implements the behavior of one telnet option on one
//! connection. Handlers never touch the socket: they describe what should
//! happen through an [`OptionContext`], and the session applies the
//! resulting [`Effect`]s in order.
//!
//! Handlers are created per connection from an [`OptionRegistry`] that is
//! built once at startup.

use crate::compression::Direction;
use crate::error::ConfigError;
use crate::telnet::protocol::{
    TelnetCommand, TelnetOption, build_command, build_negotiation, build_subnegotiation,
};
use portcullis_common::ClientCapabilities;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub mod mccp;
pub mod mssp;
pub mod naws;
pub mod sga;
pub mod ttype;

pub use mccp::{Mccp2Handler, Mccp3Handler};
pub use mssp::{MsspHandler, MsspStatus};
pub use naws::NawsHandler;
pub use sga::SgaHandler;
pub use ttype::TtypeHandler;

/// Which side a handler offers itself on when a connection starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advertise {
    /// Stay silent and only answer the client
    None,

    /// Send `IAC WILL <option>`, offering a server capability
    Will,

    /// Send `IAC DO <option>`, asking for a client capability
    Do,
}

/// Side effect requested by a handler or the negotiator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write raw bytes through the outbound transform
    Send(Vec<u8>),

    /// Install a zlib stream in a direction
    StartCompression(Direction),

    /// Remove the zlib stream in a direction
    StopCompression(Direction),

    /// Client capabilities changed and the application should hear about it
    CapabilitiesChanged,
}

/// Mutable view handed to handler hooks
pub struct OptionContext<'a> {
    capabilities: &'a mut ClientCapabilities,
    effects: &'a mut Vec<Effect>,
}

impl<'a> OptionContext<'a> {
    pub fn new(capabilities: &'a mut ClientCapabilities, effects: &'a mut Vec<Effect>) -> Self {
        Self {
            capabilities,
            effects,
        }
    }

    /// Current client capabilities
    pub fn capabilities(&self) -> &ClientCapabilities {
        self.capabilities
    }

    /// Change client capabilities, raising an update only if something changed
    pub fn update_capabilities<F>(&mut self, update: F)
    where
        F: FnOnce(&mut ClientCapabilities),
    {
        let before = self.capabilities.clone();
        update(self.capabilities);
        if *self.capabilities != before && !self.effects.contains(&Effect::CapabilitiesChanged) {
            self.effects.push(Effect::CapabilitiesChanged);
        }
    }

    /// Queue raw bytes for the client
    pub fn send(&mut self, bytes: Vec<u8>) {
        self.effects.push(Effect::Send(bytes));
    }

    /// Queue `IAC <command> <option>`
    pub fn send_negotiation(&mut self, command: TelnetCommand, option: u8) {
        self.send(build_negotiation(command, option));
    }

    /// Queue `IAC SB <option> <payload> IAC SE`
    pub fn send_subnegotiation(&mut self, option: u8, payload: &[u8]) {
        self.send(build_subnegotiation(option, payload));
    }

    /// Queue a two-byte command
    pub fn send_command(&mut self, command: TelnetCommand) {
        self.send(build_command(command));
    }

    /// Switch compression on for `direction` after the queued sends
    pub fn start_compression(&mut self, direction: Direction) {
        self.effects.push(Effect::StartCompression(direction));
    }

    /// End the compressed stream for `direction` after the queued sends
    pub fn stop_compression(&mut self, direction: Direction) {
        self.effects.push(Effect::StopCompression(direction));
    }
}

/// Behavior of a single telnet option on one connection
///
/// Every hook has a no-op default. "Local" is the server side of the option
/// (we WILL, the client says DO); "remote" is the client side (the client
/// WILLs, we say DO).
pub trait OptionHandler: Send {
    /// Option code this handler answers to
    fn option(&self) -> u8;

    /// Name used in logs and configuration
    fn name(&self) -> &'static str;

    /// Offer made when the connection starts
    fn advertise(&self) -> Advertise {
        Advertise::None
    }

    /// Whether subnegotiation payloads are routed to this handler
    fn accepts_subnegotiation(&self) -> bool {
        false
    }

    /// Whether the server may enable this option on its own side
    fn supports_local(&self) -> bool {
        self.advertise() == Advertise::Will
    }

    /// Whether the client may enable this option on its side
    fn supports_remote(&self) -> bool {
        self.advertise() == Advertise::Do
    }

    fn enable_local(&mut self, _ctx: &mut OptionContext<'_>) {}

    fn disable_local(&mut self, _ctx: &mut OptionContext<'_>) {}

    /// Client answered our WILL with DONT
    fn refused_local(&mut self, _ctx: &mut OptionContext<'_>) {}

    fn enable_remote(&mut self, _ctx: &mut OptionContext<'_>) {}

    fn disable_remote(&mut self, _ctx: &mut OptionContext<'_>) {}

    /// Client answered our DO with WONT
    fn refused_remote(&mut self, _ctx: &mut OptionContext<'_>) {}

    fn receive_subnegotiation(&mut self, _payload: &[u8], _ctx: &mut OptionContext<'_>) {}
}

/// Constructor for a fresh handler instance
pub type HandlerFactory = Arc<dyn Fn() -> Box<dyn OptionHandler> + Send + Sync>;

/// Registry of option handlers keyed by option code
///
/// Populated once at startup and shared by every listener. Each new
/// connection gets its own handler instances.
#[derive(Clone, Default)]
pub struct OptionRegistry {
    factories: BTreeMap<u8, HandlerFactory>,
}

impl fmt::Debug for OptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionRegistry")
            .field("options", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from option names, as listed in configuration
    ///
    /// Recognized names are `sga`, `naws`, `ttype`, `mccp2`, `mccp3` and
    /// `mssp`, case-insensitive.
    pub fn from_names<S: AsRef<str>>(names: &[S], mssp: MsspStatus) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for name in names {
            match name.as_ref().to_ascii_lowercase().as_str() {
                "sga" => registry.register(TelnetOption::SuppressGoAhead, || {
                    Box::new(SgaHandler::new())
                }),
                "naws" => registry.register(TelnetOption::NAWS, || Box::new(NawsHandler::new())),
                "ttype" => {
                    registry.register(TelnetOption::TerminalType, || Box::new(TtypeHandler::new()))
                }
                "mccp2" => registry.register(TelnetOption::MCCP2, || Box::new(Mccp2Handler::new())),
                "mccp3" => registry.register(TelnetOption::MCCP3, || Box::new(Mccp3Handler::new())),
                "mssp" => {
                    let status = mssp.clone();
                    registry.register(TelnetOption::MSSP, move || {
                        Box::new(MsspHandler::new(status.clone()))
                    })
                }
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
        }
        Ok(registry)
    }

    /// Register a handler constructor for `option`, replacing any previous one
    pub fn register<F>(&mut self, option: impl Into<u8>, factory: F)
    where
        F: Fn() -> Box<dyn OptionHandler> + Send + Sync + 'static,
    {
        self.factories.insert(option.into(), Arc::new(factory));
    }

    /// Whether a handler is registered for `option`
    pub fn contains(&self, option: u8) -> bool {
        self.factories.contains_key(&option)
    }

    /// Registered option codes in ascending order
    pub fn options(&self) -> Vec<u8> {
        self.factories.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Create one handler per registered option for a new connection
    pub fn instantiate(&self) -> BTreeMap<u8, Box<dyn OptionHandler>> {
        self.factories
            .iter()
            .map(|(&option, factory)| (option, factory()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status() -> MsspStatus {
        MsspStatus::new("Test", Default::default())
    }

    #[test]
    fn test_registry_from_names() {
        let registry =
            OptionRegistry::from_names(&["sga", "NAWS", "ttype", "mccp2", "mccp3", "mssp"], status())
                .unwrap();
        assert_eq!(registry.options(), vec![3, 24, 31, 70, 86, 87]);
        assert!(registry.contains(31));
        assert!(!registry.contains(201));
    }

    #[test]
    fn test_registry_unknown_name() {
        let result = OptionRegistry::from_names(&["naws", "gmcp"], status());
        assert!(matches!(result, Err(ConfigError::UnknownOption(name)) if name == "gmcp"));
    }

    #[test]
    fn test_registry_instantiates_fresh_handlers() {
        let registry = OptionRegistry::from_names(&["naws"], status()).unwrap();
        let first = registry.instantiate();
        let second = registry.instantiate();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[&31].name(), "NAWS");
    }

    #[test]
    fn test_context_update_only_flags_real_changes() {
        let mut caps = ClientCapabilities::default();
        let mut effects = Vec::new();
        let mut ctx = OptionContext::new(&mut caps, &mut effects);

        ctx.update_capabilities(|caps| caps.screen_width = 78);
        ctx.update_capabilities(|caps| caps.screen_width = 100);
        ctx.update_capabilities(|caps| caps.screen_height = 50);
        ctx.send_negotiation(TelnetCommand::DO, 31);

        assert_eq!(
            effects,
            vec![Effect::CapabilitiesChanged, Effect::Send(vec![255, 253, 31])]
        );
        assert_eq!(caps.window_size(), (100, 50));
    }
}
