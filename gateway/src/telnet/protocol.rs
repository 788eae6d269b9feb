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

//! Telnet protocol constants and utilities
//!
//! This module defines telnet protocol commands, options, and helper functions
//! for building negotiation frames and encoding outgoing text.

use bytes::{BufMut, BytesMut};

/// Carriage return
pub const CR: u8 = b'\r';

/// Line feed
pub const LF: u8 = b'\n';

/// Null, sent after a bare carriage return
pub const NUL: u8 = 0;

/// Telnet command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TelnetCommand {
    /// Interpret As Command
    IAC = 255,
    /// Don't do option
    DONT = 254,
    /// Do option
    DO = 253,
    /// Won't do option
    WONT = 252,
    /// Will do option
    WILL = 251,
    /// Subnegotiation begin
    SB = 250,
    /// Go ahead
    GA = 249,
    /// Erase line
    EL = 248,
    /// Erase character
    EC = 247,
    /// Are you there
    AYT = 246,
    /// Abort output
    AO = 245,
    /// Interrupt process
    IP = 244,
    /// Break
    BRK = 243,
    /// Data mark
    DM = 242,
    /// No operation
    NOP = 241,
    /// Subnegotiation end
    SE = 240,
}

impl TelnetCommand {
    /// Convert byte to telnet command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            255 => Some(Self::IAC),
            254 => Some(Self::DONT),
            253 => Some(Self::DO),
            252 => Some(Self::WONT),
            251 => Some(Self::WILL),
            250 => Some(Self::SB),
            249 => Some(Self::GA),
            248 => Some(Self::EL),
            247 => Some(Self::EC),
            246 => Some(Self::AYT),
            245 => Some(Self::AO),
            244 => Some(Self::IP),
            243 => Some(Self::BRK),
            242 => Some(Self::DM),
            241 => Some(Self::NOP),
            240 => Some(Self::SE),
            _ => None,
        }
    }

    /// Convert command to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// True for WILL, WONT, DO and DONT
    pub fn is_negotiation(self) -> bool {
        matches!(self, Self::WILL | Self::WONT | Self::DO | Self::DONT)
    }

    /// True for the two-byte commands reported as command events
    pub fn is_simple(self) -> bool {
        matches!(
            self,
            Self::NOP
                | Self::DM
                | Self::BRK
                | Self::IP
                | Self::AO
                | Self::AYT
                | Self::EC
                | Self::EL
                | Self::GA
        )
    }
}

/// Telnet option codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TelnetOption {
    /// Binary transmission
    Binary = 0,
    /// Echo
    Echo = 1,
    /// Suppress go ahead
    SuppressGoAhead = 3,
    /// Terminal type
    TerminalType = 24,
    /// Negotiate about window size (NAWS)
    NAWS = 31,
    /// MSDP (MUD Server Data Protocol)
    MSDP = 69,
    /// MSSP (MUD Server Status Protocol)
    MSSP = 70,
    /// MCCP2 (MUD Client Compression Protocol v2)
    MCCP2 = 86,
    /// MCCP3 (MUD Client Compression Protocol v3)
    MCCP3 = 87,
    /// MXP (MUD eXtension Protocol)
    MXP = 91,
    /// GMCP (Generic MUD Communication Protocol)
    GMCP = 201,
}

impl TelnetOption {
    /// Convert byte to telnet option
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Binary),
            1 => Some(Self::Echo),
            3 => Some(Self::SuppressGoAhead),
            24 => Some(Self::TerminalType),
            31 => Some(Self::NAWS),
            69 => Some(Self::MSDP),
            70 => Some(Self::MSSP),
            86 => Some(Self::MCCP2),
            87 => Some(Self::MCCP3),
            91 => Some(Self::MXP),
            201 => Some(Self::GMCP),
            _ => None,
        }
    }

    /// Convert option to byte
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

impl From<TelnetOption> for u8 {
    fn from(option: TelnetOption) -> Self {
        option.to_byte()
    }
}

/// Build a telnet negotiation sequence
pub fn build_negotiation(command: TelnetCommand, option: impl Into<u8>) -> Vec<u8> {
    vec![TelnetCommand::IAC.to_byte(), command.to_byte(), option.into()]
}

/// Build a two-byte telnet command sequence
pub fn build_command(command: TelnetCommand) -> Vec<u8> {
    vec![TelnetCommand::IAC.to_byte(), command.to_byte()]
}

/// Build a telnet subnegotiation sequence
pub fn build_subnegotiation(option: impl Into<u8>, data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() + 5);
    result.extend_from_slice(&[
        TelnetCommand::IAC.to_byte(),
        TelnetCommand::SB.to_byte(),
        option.into(),
    ]);

    // Escape IAC bytes in data
    for &byte in data {
        result.push(byte);
        if byte == TelnetCommand::IAC.to_byte() {
            result.push(byte);
        }
    }

    result.push(TelnetCommand::IAC.to_byte());
    result.push(TelnetCommand::SE.to_byte());

    result
}

/// Parse window size from NAWS subnegotiation data
///
/// Only an exact four byte payload is accepted.
pub fn parse_window_size(data: &[u8]) -> Option<(u16, u16)> {
    match data {
        [w0, w1, h0, h1] => Some((
            u16::from_be_bytes([*w0, *w1]),
            u16::from_be_bytes([*h0, *h1]),
        )),
        _ => None,
    }
}

/// Encode application data for the wire
///
/// IAC is doubled, `\n` becomes `\r\n` and a bare `\r` becomes `\r\0`.
/// An existing `\r\n` pair is passed through unchanged.
pub fn encode_data(data: &[u8], dst: &mut BytesMut) {
    dst.reserve(data.len() + data.len() / 16 + 2);
    let mut bytes = data.iter().copied().peekable();
    while let Some(byte) = bytes.next() {
        match byte {
            0xFF => dst.put_slice(&[0xFF, 0xFF]),
            LF => dst.put_slice(&[CR, LF]),
            CR if bytes.peek() == Some(&LF) => {
                bytes.next();
                dst.put_slice(&[CR, LF]);
            }
            CR => dst.put_slice(&[CR, NUL]),
            _ => dst.put_u8(byte),
        }
    }
}

/// Encode application text for the wire
pub fn encode_text(text: &str, dst: &mut BytesMut) {
    encode_data(text.as_bytes(), dst);
}
