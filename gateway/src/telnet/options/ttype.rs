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

//! Terminal Type (option 24) with MTTS
//!
//! The client is asked for its terminal type up to three times. By
//! convention (MTTS) the first answer is the client name, the second the
//! terminal type and the third an `MTTS <bits>` capability bitfield. A
//! client that repeats its first answer does not cycle, and we stop asking.

use crate::telnet::options::{Advertise, OptionContext, OptionHandler};
use crate::telnet::protocol::TelnetOption;
use portcullis_common::ClientCapabilities;
use tracing::{debug, trace};

/// TTYPE subnegotiation: client reports its type
pub const TTYPE_IS: u8 = 0;

/// TTYPE subnegotiation: server requests the next type
pub const TTYPE_SEND: u8 = 1;

const MAX_ROUNDS: u8 = 3;

/// MTTS capability bits
pub mod mtts {
    pub const ANSI: u32 = 1;
    pub const VT100: u32 = 2;
    pub const UTF8: u32 = 4;
    pub const XTERM256: u32 = 8;
    pub const MOUSE_TRACKING: u32 = 16;
    pub const OSC_COLOR_PALETTE: u32 = 32;
    pub const SCREENREADER: u32 = 64;
    pub const PROXY: u32 = 128;
}

/// Clients known to handle 256 colors in any release still in use
const XTERM256_CLIENTS: &[&str] = &[
    "ATLANTIS",
    "CMUD",
    "KILDCLIENT",
    "MUDLET",
    "MUSHCLIENT",
    "PUTTY",
    "BEIP",
    "POTATO",
    "TINYFUGUE",
];

/// Collects client name, terminal type and MTTS flags
#[derive(Debug, Default)]
pub struct TtypeHandler {
    round: u8,
    first_answer: Option<Vec<u8>>,
}

impl TtypeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of answers processed so far
    pub fn rounds(&self) -> u8 {
        self.round
    }

    fn request(ctx: &mut OptionContext<'_>) {
        ctx.send_subnegotiation(TelnetOption::TerminalType.to_byte(), &[TTYPE_SEND]);
    }
}

impl OptionHandler for TtypeHandler {
    fn option(&self) -> u8 {
        TelnetOption::TerminalType.to_byte()
    }

    fn name(&self) -> &'static str {
        "TTYPE"
    }

    fn advertise(&self) -> Advertise {
        Advertise::Do
    }

    fn accepts_subnegotiation(&self) -> bool {
        true
    }

    fn enable_remote(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.ttype = true);
        Self::request(ctx);
    }

    fn disable_remote(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.ttype = false);
    }

    fn receive_subnegotiation(&mut self, payload: &[u8], ctx: &mut OptionContext<'_>) {
        let Some((&TTYPE_IS, answer)) = payload.split_first() else {
            debug!("Dropping malformed TTYPE payload");
            return;
        };
        if self.round >= MAX_ROUNDS {
            trace!("Ignoring TTYPE answer after final round");
            return;
        }
        let text = String::from_utf8_lossy(answer);
        trace!(round = self.round, answer = %text, "TTYPE answer");

        match self.round {
            0 => {
                ctx.update_capabilities(|caps| apply_client_name(caps, &text));
                self.first_answer = Some(answer.to_vec());
                self.round += 1;
                Self::request(ctx);
            }
            1 => {
                if self.first_answer.as_deref() == Some(answer) {
                    debug!("Client does not cycle terminal types");
                    self.round = MAX_ROUNDS;
                    return;
                }
                ctx.update_capabilities(|caps| apply_terminal_type(caps, &text));
                self.round += 1;
                Self::request(ctx);
            }
            _ => {
                ctx.update_capabilities(|caps| apply_mtts(caps, &text));
                self.round += 1;
            }
        }
    }
}

fn apply_client_name(caps: &mut ClientCapabilities, answer: &str) {
    let upper = answer.trim().to_uppercase();
    let mut parts = upper.split_whitespace();
    let name = parts.next().unwrap_or_default().to_string();
    let version = parts.next().map(str::to_string);

    let mut xterm256 = name.starts_with("XTERM")
        || name.ends_with("-256COLOR")
        || XTERM256_CLIENTS.contains(&name.as_str());

    if name == "MUDLET" {
        caps.forced_endline = false;
        if let Some(version) = version.as_deref() {
            xterm256 = version_at_least(version, (1, 1));
        }
    }
    if name.starts_with("TINTIN++") {
        caps.forced_endline = true;
    }

    caps.client_name = name;
    if let Some(version) = version {
        caps.client_version = version;
    }
    // Every client that answers TTYPE at all handles ANSI
    caps.ansi = true;
    caps.xterm256 = caps.xterm256 || xterm256;
}

fn apply_terminal_type(caps: &mut ClientCapabilities, answer: &str) {
    let upper = answer.to_uppercase();
    let xterm256 =
        upper.ends_with("-256COLOR") || (upper.ends_with("XTERM") && !upper.ends_with("-COLOR"));
    if xterm256 {
        caps.ansi = true;
        caps.xterm256 = true;
    }
    caps.terminal_type = Some(answer.to_string());
}

fn apply_mtts(caps: &mut ClientCapabilities, answer: &str) {
    let Some(value) = answer.strip_prefix("MTTS") else {
        debug!(answer, "Third TTYPE answer is not MTTS");
        return;
    };
    let value = value.trim();
    match value.parse::<u32>() {
        Ok(bits) => {
            let has = |bit: u32| bits & bit != 0;
            caps.ansi |= has(mtts::ANSI);
            caps.vt100 |= has(mtts::VT100);
            caps.utf8 |= has(mtts::UTF8);
            caps.xterm256 |= has(mtts::XTERM256);
            caps.mouse_tracking |= has(mtts::MOUSE_TRACKING);
            caps.osc_color_palette |= has(mtts::OSC_COLOR_PALETTE);
            caps.screen_reader |= has(mtts::SCREENREADER);
            caps.proxy |= has(mtts::PROXY);
        }
        Err(_) => {
            // Some clients send the capability name instead of the bitfield
            match value.to_uppercase().as_str() {
                "ANSI" => caps.ansi = true,
                "VT100" => caps.vt100 = true,
                "UTF-8" | "UTF8" => caps.utf8 = true,
                "XTERM256" => caps.xterm256 = true,
                "MOUSE_TRACKING" => caps.mouse_tracking = true,
                "OSC_COLOR_PALETTE" => caps.osc_color_palette = true,
                "SCREENREADER" => caps.screen_reader = true,
                "PROXY" => caps.proxy = true,
                other => debug!(flag = other, "Unknown MTTS flag"),
            }
        }
    }
}

fn version_at_least(version: &str, minimum: (u32, u32)) -> bool {
    let mut parts = version.split('.').map(|part| {
        part.chars()
            .take_while(char::is_ascii_digit)
            .collect::<String>()
            .parse::<u32>()
            .unwrap_or(0)
    });
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    (major, minor) >= minimum
}
