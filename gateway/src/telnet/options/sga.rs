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

//! Suppress Go Ahead (option 3)

use crate::telnet::options::{Advertise, OptionContext, OptionHandler};
use crate::telnet::protocol::TelnetOption;

/// Offers to stop sending Go Ahead after prompts
#[derive(Debug, Default)]
pub struct SgaHandler;

impl SgaHandler {
    pub fn new() -> Self {
        Self
    }
}

impl OptionHandler for SgaHandler {
    fn option(&self) -> u8 {
        TelnetOption::SuppressGoAhead.to_byte()
    }

    fn name(&self) -> &'static str {
        "SGA"
    }

    fn advertise(&self) -> Advertise {
        Advertise::Will
    }

    fn enable_local(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.sga = true);
    }

    fn disable_local(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.sga = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::options::Effect;
    use portcullis_common::ClientCapabilities;

    #[test]
    fn test_sga_records_capability() {
        let mut handler = SgaHandler::new();
        let mut caps = ClientCapabilities::default();
        let mut effects = Vec::new();

        handler.enable_local(&mut OptionContext::new(&mut caps, &mut effects));
        assert!(caps.sga);
        assert_eq!(effects, vec![Effect::CapabilitiesChanged]);

        effects.clear();
        handler.disable_local(&mut OptionContext::new(&mut caps, &mut effects));
        assert!(!caps.sga);
    }

    #[test]
    fn test_sga_sides() {
        let handler = SgaHandler::new();
        assert!(handler.supports_local());
        assert!(!handler.supports_remote());
        assert!(!handler.accepts_subnegotiation());
    }
}
