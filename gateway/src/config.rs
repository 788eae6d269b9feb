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

//! Gateway configuration
//!
//! Command line arguments are parsed with clap; everything else comes from a
//! YAML file in which string and port values may reference the environment
//! as `${VAR}` or `${VAR:-default}`.

use crate::error::ConfigError;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_env_field::EnvField;
use std::collections::BTreeMap;
use std::net::{AddrParseError, IpAddr, Ipv4Addr};
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Arguments {
    #[arg(
        short = 'c',
        long = "config",
        help = "Path to configuration file",
        default_value = "gateway/config.yaml"
    )]
    pub config_file: String,

    #[arg(
        short = 'e',
        long = "env",
        help = "Path to environment file",
        default_value = "gateway/.env"
    )]
    pub env_file: Option<String>,
}

impl Default for Arguments {
    fn default() -> Self {
        Self {
            config_file: "config.yaml".to_string(),
            env_file: Some(".env".to_string()),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Named bind addresses, merged over the built-in `loopback`, `internal`
    /// and `external` names
    #[serde(default)]
    pub interfaces: BTreeMap<String, EnvField<InterfaceAddress>>,

    /// TLS contexts by name
    #[serde(default)]
    pub tls: BTreeMap<String, TlsConfig>,

    /// Listeners, in start order
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,

    #[serde(default)]
    pub telnet: TelnetSettings,

    #[serde(default)]
    pub mssp: MsspConfig,
}

impl Configuration {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from file: {}", path);
        let file = std::fs::File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;

        let conf: Configuration = serde_yaml::from_reader(file)?;
        conf.validate()?;
        Ok(conf)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let conf: Configuration = serde_yaml::from_str(yaml)?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.telnet.validate()
    }
}

/// Address a named interface binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress(IpAddr);

impl InterfaceAddress {
    pub fn to_ip(&self) -> IpAddr {
        self.0
    }
}

impl FromStr for InterfaceAddress {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(IpAddr::from_str(s.trim())?))
    }
}

impl Default for InterfaceAddress {
    fn default() -> Self {
        Self(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }
}

impl std::fmt::Display for InterfaceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Certificate chain and private key for one TLS context, both PEM files
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert: EnvField<String>,
    pub key: EnvField<String>,
}

/// One configured listener
#[derive(Debug, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub name: String,

    /// Interface name or literal IP address (default: `external`)
    #[serde(default = "default_interface")]
    pub interface: String,

    pub port: EnvField<u16>,

    /// Wire protocol (default: `telnet`)
    #[serde(default = "default_protocol")]
    pub protocol: String,

    #[serde(default)]
    pub tls: TlsSetting,
}

fn default_interface() -> String {
    "external".to_string()
}

fn default_protocol() -> String {
    "telnet".to_string()
}

/// `tls:` value of a listener: a flag or a context name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TlsSetting {
    Enabled(bool),
    Context(String),
}

impl Default for TlsSetting {
    fn default() -> Self {
        TlsSetting::Enabled(false)
    }
}

impl TlsSetting {
    /// Name of the TLS context to use; `true` means `default`
    pub fn context(&self) -> Option<&str> {
        match self {
            TlsSetting::Enabled(true) => Some("default"),
            TlsSetting::Enabled(false) => None,
            TlsSetting::Context(name) => Some(name.as_str()),
        }
    }
}

/// Per-connection telnet settings shared by all listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelnetSettings {
    /// Options offered or accepted, by name
    pub options: Vec<String>,

    /// Socket read size in bytes (default: 4096)
    pub read_buffer_size: usize,

    /// Pending output above which application events stop being pulled (default: 65536)
    pub high_water_mark: usize,

    /// Pending output below which pulling resumes (default: 16384)
    pub low_water_mark: usize,

    /// Application events queued per connection before senders wait (default: 256)
    pub outbound_queue_size: usize,

    /// Longest accepted input line in bytes (default: 8192)
    pub max_line_length: usize,

    /// Longest accepted subnegotiation payload in bytes (default: 8192)
    pub max_subnegotiation_length: usize,
}

impl Default for TelnetSettings {
    fn default() -> Self {
        Self {
            options: ["sga", "naws", "ttype", "mccp2", "mccp3", "mssp"]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            read_buffer_size: 4096,
            high_water_mark: 65536,
            low_water_mark: 16384,
            outbound_queue_size: 256,
            max_line_length: 8192,
            max_subnegotiation_length: 8192,
        }
    }
}

impl TelnetSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.low_water_mark > self.high_water_mark {
            return Err(ConfigError::Watermarks {
                low: self.low_water_mark,
                high: self.high_water_mark,
            });
        }
        if self.outbound_queue_size == 0 {
            return Err(ConfigError::QueueSize);
        }
        Ok(())
    }
}

/// Static part of the MSSP status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsspConfig {
    /// Reported as NAME (default: `Portcullis`)
    pub name: String,

    /// Additional variables reported verbatim
    pub extra: BTreeMap<String, String>,
}

impl Default for MsspConfig {
    fn default() -> Self {
        Self {
            name: "Portcullis".to_string(),
            extra: BTreeMap::new(),
        }
    }
}
