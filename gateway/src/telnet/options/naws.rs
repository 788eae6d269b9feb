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

//! Negotiate About Window Size (option 31)

use crate::telnet::options::{Advertise, OptionContext, OptionHandler};
use crate::telnet::protocol::{TelnetOption, parse_window_size};
use tracing::{debug, trace};

/// Asks the client to report its window size
#[derive(Debug, Default)]
pub struct NawsHandler {
    size: Option<(u16, u16)>,
}

impl NawsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last window size reported by the client
    pub fn size(&self) -> Option<(u16, u16)> {
        self.size
    }
}

impl OptionHandler for NawsHandler {
    fn option(&self) -> u8 {
        TelnetOption::NAWS.to_byte()
    }

    fn name(&self) -> &'static str {
        "NAWS"
    }

    fn advertise(&self) -> Advertise {
        Advertise::Do
    }

    fn accepts_subnegotiation(&self) -> bool {
        true
    }

    fn enable_remote(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.naws = true);
    }

    fn disable_remote(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.naws = false);
    }

    fn receive_subnegotiation(&mut self, payload: &[u8], ctx: &mut OptionContext<'_>) {
        let Some((width, height)) = parse_window_size(payload) else {
            debug!(len = payload.len(), "Dropping malformed NAWS payload");
            return;
        };
        trace!(width, height, "Window size reported");
        self.size = Some((width, height));
        ctx.update_capabilities(|caps| {
            caps.screen_width = width;
            caps.screen_height = height;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::options::Effect;
    use portcullis_common::ClientCapabilities;

    #[test]
    fn test_naws_records_size() {
        let mut handler = NawsHandler::new();
        let mut caps = ClientCapabilities::default();
        let mut effects = Vec::new();

        handler.receive_subnegotiation(&[0, 80, 0, 24], &mut OptionContext::new(&mut caps, &mut effects));
        assert_eq!(handler.size(), Some((80, 24)));
        assert_eq!(caps.window_size(), (80, 24));
        assert_eq!(effects, vec![Effect::CapabilitiesChanged]);
    }

    #[test]
    fn test_naws_same_size_raises_no_update() {
        let mut handler = NawsHandler::new();
        let mut caps = ClientCapabilities::default();
        let mut effects = Vec::new();

        handler.receive_subnegotiation(&[0, 78, 0, 24], &mut OptionContext::new(&mut caps, &mut effects));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_naws_malformed_payload_dropped() {
        let mut handler = NawsHandler::new();
        let mut caps = ClientCapabilities::default();
        let mut effects = Vec::new();

        handler.receive_subnegotiation(&[0, 80, 0], &mut OptionContext::new(&mut caps, &mut effects));
        assert_eq!(handler.size(), None);
        assert_eq!(caps.window_size(), (78, 24));
        assert!(effects.is_empty());
    }
}
