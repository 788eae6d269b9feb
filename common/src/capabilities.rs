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

//! Client capabilities negotiated during a connection

use serde::{Deserialize, Serialize};

/// Default screen width reported before NAWS says otherwise
pub const DEFAULT_SCREEN_WIDTH: u16 = 78;

/// Default screen height reported before NAWS says otherwise
pub const DEFAULT_SCREEN_HEIGHT: u16 = 24;

/// Client capabilities negotiated during connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    /// Client name reported in the first TTYPE round
    pub client_name: String,

    /// Client version, when the name carried one (e.g. `MUDLET 4.17`)
    pub client_version: String,

    /// Terminal type reported in the second TTYPE round
    pub terminal_type: Option<String>,

    /// Terminal width in columns
    pub screen_width: u16,

    /// Terminal height in rows
    pub screen_height: u16,

    /// Supports ANSI colors
    pub ansi: bool,

    /// Supports VT100 control sequences
    pub vt100: bool,

    /// Accepts UTF-8 text
    pub utf8: bool,

    /// Supports 256 color xterm sequences
    pub xterm256: bool,

    /// Supports xterm mouse tracking
    pub mouse_tracking: bool,

    /// Supports the OSC color palette
    pub osc_color_palette: bool,

    /// Client is a screen reader
    pub screen_reader: bool,

    /// Client is a proxy relaying for another client
    pub proxy: bool,

    /// Client wants an explicit line ending after prompts
    pub forced_endline: bool,

    /// Suppress Go Ahead is active
    pub sga: bool,

    /// Window size negotiation is active
    pub naws: bool,

    /// Terminal type negotiation is active
    pub ttype: bool,

    /// Outgoing (server to client) compression is active
    pub mccp2: bool,

    /// Incoming (client to server) compression is active
    pub mccp3: bool,

    /// Client asked for server status
    pub mssp: bool,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            client_name: "UNKNOWN".to_string(),
            client_version: "UNKNOWN".to_string(),
            terminal_type: None,
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
            ansi: false,
            vt100: false,
            utf8: false,
            xterm256: false,
            mouse_tracking: false,
            osc_color_palette: false,
            screen_reader: false,
            proxy: false,
            forced_endline: false,
            sga: false,
            naws: false,
            ttype: false,
            mccp2: false,
            mccp3: false,
            mssp: false,
        }
    }
}

impl ClientCapabilities {
    /// Terminal window size as (width, height)
    pub fn window_size(&self) -> (u16, u16) {
        (self.screen_width, self.screen_height)
    }
}
