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

//! MUD Server Status Protocol (option 70)

use crate::telnet::options::{Advertise, OptionContext, OptionHandler};
use crate::telnet::protocol::TelnetOption;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Marks the start of a variable name
pub const MSSP_VAR: u8 = 1;

/// Marks the start of a variable value
pub const MSSP_VAL: u8 = 2;

/// Live server status reported to MSSP crawlers
///
/// Cheap to clone; the player count is shared with the connection registry.
#[derive(Debug, Clone)]
pub struct MsspStatus {
    name: String,
    extra: BTreeMap<String, String>,
    started_at: DateTime<Utc>,
    players: Arc<AtomicUsize>,
}

impl MsspStatus {
    /// Create a status with its own player counter, starting now
    pub fn new(name: impl Into<String>, extra: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            extra,
            started_at: Utc::now(),
            players: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Report players from a shared counter
    pub fn with_players(mut self, players: Arc<AtomicUsize>) -> Self {
        self.players = players;
        self
    }

    pub fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn players(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }

    /// Variables in reporting order: NAME, PLAYERS, UPTIME, then extras
    pub fn variables(&self) -> Vec<(String, String)> {
        let mut variables = vec![
            ("NAME".to_string(), self.name.clone()),
            ("PLAYERS".to_string(), self.players().to_string()),
            ("UPTIME".to_string(), self.started_at.timestamp().to_string()),
        ];
        variables.extend(
            self.extra
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "NAME" | "PLAYERS" | "UPTIME"))
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        variables
    }

    /// Subnegotiation payload, without the IAC SB/SE framing
    pub fn payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        for (key, value) in self.variables() {
            payload.push(MSSP_VAR);
            payload.extend(key.bytes().filter(|b| !is_mssp_marker(*b)));
            payload.push(MSSP_VAL);
            payload.extend(value.bytes().filter(|b| !is_mssp_marker(*b)));
        }
        payload
    }
}

fn is_mssp_marker(byte: u8) -> bool {
    matches!(byte, 0 | MSSP_VAR | MSSP_VAL)
}

/// Sends server status when a crawler asks for it with DO MSSP
#[derive(Debug)]
pub struct MsspHandler {
    status: MsspStatus,
}

impl MsspHandler {
    pub fn new(status: MsspStatus) -> Self {
        Self { status }
    }
}

impl OptionHandler for MsspHandler {
    fn option(&self) -> u8 {
        TelnetOption::MSSP.to_byte()
    }

    fn name(&self) -> &'static str {
        "MSSP"
    }

    fn advertise(&self) -> Advertise {
        Advertise::Will
    }

    fn enable_local(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.mssp = true);
        ctx.send_subnegotiation(self.option(), &self.status.payload());
    }

    fn disable_local(&mut self, ctx: &mut OptionContext<'_>) {
        ctx.update_capabilities(|caps| caps.mssp = false);
    }
}
