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

//! MUD Client Compression Protocol, versions 2 (option 86) and 3 (option 87)

use crate::compression::Direction;
use crate::telnet::options::{Advertise, OptionContext, OptionHandler};
use crate::telnet::protocol::TelnetOption;
use tracing::debug;

/// Compresses everything the server sends once the client agrees
///
/// On enable the empty `IAC SB MCCP2 IAC SE` marker goes out uncompressed,
/// and every byte after it is part of the zlib stream.
#[derive(Debug, Default)]
pub struct Mccp2Handler;

impl Mccp2Handler {
    pub fn new() -> Self {
        Self
    }
}

impl OptionHandler for Mccp2Handler {
    fn option(&self) -> u8 {
        TelnetOption::MCCP2.to_byte()
    }

    fn name(&self) -> &'static str {
        "MCCP2"
    }

    fn advertise(&self) -> Advertise {
        Advertise::Will
    }

    fn enable_local(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.send_subnegotiation(self.option(), &[]);
        ctx.start_compression(Direction::Outbound);
        ctx.update_capabilities(|caps| caps.mccp2 = true);
    }

    fn disable_local(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.stop_compression(Direction::Outbound);
        ctx.update_capabilities(|caps| caps.mccp2 = false);
    }
}

/// Decompresses everything the client sends after it starts its stream
///
/// The client answers our WILL with DO, then sends an empty
/// `IAC SB MCCP3 IAC SE`; the bytes right after that marker are compressed.
#[derive(Debug, Default)]
pub struct Mccp3Handler {
    agreed: bool,
}

impl Mccp3Handler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionHandler for Mccp3Handler {
    fn option(&self) -> u8 {
        TelnetOption::MCCP3.to_byte()
    }

    fn name(&self) -> &'static str {
        "MCCP3"
    }

    fn advertise(&self) -> Advertise {
        Advertise::Will
    }

    fn accepts_subnegotiation(&self) -> bool {
        true
    }

    fn enable_local(&mut self, _ctx: &mut OptionContext<'_>) {
        self.agreed = true;
    }

    fn disable_local(&mut self, ctx: &mut OptionContext<'_>) {
        self.agreed = false;
        ctx.stop_compression(Direction::Inbound);
        ctx.update_capabilities(|caps| caps.mccp3 = false);
    }

    fn receive_subnegotiation(&mut self, payload: &[u8], ctx: &mut OptionContext<'_>) {
        if !payload.is_empty() {
            debug!(len = payload.len(), "Dropping non-empty MCCP3 payload");
            return;
        }
        if !self.agreed {
            debug!("Ignoring MCCP3 start before the client agreed");
            return;
        }
        ctx.start_compression(Direction::Inbound);
        ctx.update_capabilities(|caps| caps.mccp3 = true);
    }
}
