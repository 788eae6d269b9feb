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

//! Telnet byte stream decoder
//!
//! Turns raw socket bytes into line, command, negotiation and subnegotiation
//! events. The decoder keeps its state across reads, so a stream split at any
//! byte boundary yields the same events as the unsplit stream.

use crate::error::TelnetError;
use crate::telnet::protocol::{CR, LF, NUL, TelnetCommand};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::warn;

/// Default cap on an assembled line, in bytes
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8192;

/// Default cap on a subnegotiation payload, in bytes
pub const DEFAULT_MAX_SUBNEGOTIATION_LENGTH: usize = 8192;

const IAC: u8 = TelnetCommand::IAC as u8;
const SB: u8 = TelnetCommand::SB as u8;
const SE: u8 = TelnetCommand::SE as u8;

/// Event produced by [`TelnetDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// A complete line of input, without its terminator
    Line(String),

    /// A two-byte command such as `IAC AYT`
    Command(TelnetCommand),

    /// `IAC <verb> <option>` where verb is WILL, WONT, DO or DONT
    Negotiation(TelnetCommand, u8),

    /// `IAC SB <option> <payload> IAC SE` with IAC escapes removed
    Subnegotiation(u8, Bytes),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Data,
    Escaped,
    Command(TelnetCommand),
    Subnegotiation,
    InSubnegotiation(u8),
    SubEscaped(u8),
    Endline,
}

/// Stateful telnet decoder, one per connection
#[derive(Debug)]
pub struct TelnetDecoder {
    state: DecoderState,
    line: BytesMut,
    payload: BytesMut,
    max_line_length: usize,
    max_subnegotiation_length: usize,
    line_truncated: bool,
    payload_overflow: bool,
}

impl Default for TelnetDecoder {
    fn default() -> Self {
        Self::with_limits(DEFAULT_MAX_LINE_LENGTH, DEFAULT_MAX_SUBNEGOTIATION_LENGTH)
    }
}

impl TelnetDecoder {
    /// Create a decoder with default buffer limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with explicit buffer limits
    pub fn with_limits(max_line_length: usize, max_subnegotiation_length: usize) -> Self {
        Self {
            state: DecoderState::Data,
            line: BytesMut::with_capacity(256),
            payload: BytesMut::new(),
            max_line_length,
            max_subnegotiation_length,
            line_truncated: false,
            payload_overflow: false,
        }
    }

    /// Bytes of the line assembled so far
    pub fn pending_line(&self) -> &[u8] {
        &self.line
    }

    /// Decode every complete event in `data`
    ///
    /// Bytes that do not complete an event stay buffered for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<TelnetEvent> {
        data.iter().filter_map(|&byte| self.step(byte)).collect()
    }

    fn step(&mut self, byte: u8) -> Option<TelnetEvent> {
        match (self.state, byte) {
            (DecoderState::Data, IAC) => {
                self.state = DecoderState::Escaped;
            }
            (DecoderState::Data, CR) => {
                self.state = DecoderState::Endline;
            }
            (DecoderState::Data, LF) => {
                return Some(self.take_line());
            }
            (DecoderState::Data, NUL) => {
                // Keepalive, never part of a line
            }
            (DecoderState::Data, _) => {
                self.push_line(byte);
            }
            (DecoderState::Escaped, IAC) => {
                self.push_line(IAC);
                self.state = DecoderState::Data;
            }
            (DecoderState::Escaped, SB) => {
                self.state = DecoderState::Subnegotiation;
            }
            (DecoderState::Escaped, _) => {
                self.state = DecoderState::Data;
                match TelnetCommand::from_byte(byte) {
                    Some(verb) if verb.is_negotiation() => {
                        self.state = DecoderState::Command(verb);
                    }
                    Some(command) if command.is_simple() => {
                        return Some(TelnetEvent::Command(command));
                    }
                    _ => {
                        warn!("Dropping unexpected byte after IAC: 0x{:02X}", byte);
                    }
                }
            }
            (DecoderState::Command(verb), option) => {
                self.state = DecoderState::Data;
                return Some(TelnetEvent::Negotiation(verb, option));
            }
            (DecoderState::Subnegotiation, option) => {
                self.payload.clear();
                self.payload_overflow = false;
                self.state = DecoderState::InSubnegotiation(option);
            }
            (DecoderState::InSubnegotiation(option), IAC) => {
                self.state = DecoderState::SubEscaped(option);
            }
            (DecoderState::InSubnegotiation(_), _) => {
                self.push_payload(byte);
            }
            (DecoderState::SubEscaped(option), SE) => {
                self.state = DecoderState::Data;
                let payload = self.payload.split().freeze();
                if self.payload_overflow {
                    self.payload_overflow = false;
                    warn!(
                        option,
                        limit = self.max_subnegotiation_length,
                        "Discarding oversized subnegotiation"
                    );
                    return None;
                }
                return Some(TelnetEvent::Subnegotiation(option, payload));
            }
            (DecoderState::SubEscaped(option), _) => {
                self.push_payload(byte);
                self.state = DecoderState::InSubnegotiation(option);
            }
            (DecoderState::Endline, LF) => {
                self.state = DecoderState::Data;
                return Some(self.take_line());
            }
            (DecoderState::Endline, NUL) => {
                self.push_line(CR);
                self.state = DecoderState::Data;
            }
            (DecoderState::Endline, IAC) => {
                self.push_line(CR);
                self.state = DecoderState::Escaped;
            }
            (DecoderState::Endline, _) => {
                self.push_line(CR);
                self.push_line(byte);
                self.state = DecoderState::Data;
            }
        }
        None
    }

    fn push_line(&mut self, byte: u8) {
        if self.line.len() < self.max_line_length {
            self.line.extend_from_slice(&[byte]);
        } else if !self.line_truncated {
            self.line_truncated = true;
            warn!(limit = self.max_line_length, "Input line too long, truncating");
        }
    }

    fn push_payload(&mut self, byte: u8) {
        if self.payload.len() < self.max_subnegotiation_length {
            self.payload.extend_from_slice(&[byte]);
        } else {
            self.payload_overflow = true;
        }
    }

    fn take_line(&mut self) -> TelnetEvent {
        self.line_truncated = false;
        let line = self.line.split();
        TelnetEvent::Line(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Decoder for TelnetDecoder {
    type Item = TelnetEvent;
    type Error = TelnetError;

    /// Consume bytes from `src` until one event is complete
    ///
    /// Returns as soon as an event is produced so the caller can react to it
    /// (for example by switching on decompression) before the remaining bytes
    /// are decoded.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TelnetEvent>, Self::Error> {
        while src.has_remaining() {
            let byte = src.get_u8();
            if let Some(event) = self.step(byte) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }
}
