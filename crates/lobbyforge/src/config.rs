//! Server configuration, loaded from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! server listening on `0.0.0.0:1338` for TCP and UDP that expects game
//! version `0.1.1`.
//!
//! ```toml
//! bind_ip = "0.0.0.0"
//! port = 1338
//! game_version = "0.1.1"
//! log_level = "debug"
//! tick_interval_ms = 20
//! tick_policy = "skip"
//! ```

use std::path::Path;
use std::time::Duration;

use lobbyforge_lobby::LobbyConfig;
use lobbyforge_tick::{TickConfig, TickPolicy};
use lobbyforge_transport::{DEFAULT_READ_BUFFER, DEFAULT_UDP_BUFFER, TcpConfig};
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// How a late lobby tick catches up. Mirrors [`TickPolicy`] for the
/// config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickPolicySetting {
    /// Jump ahead, never burst.
    #[default]
    Skip,
    /// Keep the original grid.
    Drop,
}

impl From<TickPolicySetting> for TickPolicy {
    fn from(setting: TickPolicySetting) -> Self {
        match setting {
            TickPolicySetting::Skip => TickPolicy::Skip,
            TickPolicySetting::Drop => TickPolicy::Drop,
        }
    }
}

/// Everything the operator can tune.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address both listeners bind to.
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// UDP port. Same as the TCP port when unset.
    #[serde(default)]
    pub udp_port: Option<u16>,

    /// Version string clients must send in their Hello.
    #[serde(default = "default_game_version")]
    pub game_version: String,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Lobby tick interval in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,

    /// What a lobby does after a late tick: `"skip"` or `"drop"`.
    #[serde(default)]
    pub tick_policy: TickPolicySetting,

    /// Size of one TCP socket read.
    #[serde(default = "default_read_buffer")]
    pub read_buffer_size: usize,

    /// Size of the UDP receive buffer.
    #[serde(default = "default_udp_buffer")]
    pub udp_buffer_size: usize,

    /// Capacity of the process-wide outbound queue.
    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// Capacity of each lobby's gameplay channel.
    #[serde(default = "default_gameplay_capacity")]
    pub gameplay_capacity: usize,

    /// Capacity of each lobby's control channel.
    #[serde(default = "default_control_capacity")]
    pub control_capacity: usize,
}

impl ServerConfig {
    /// Loads the configuration from `path`.
    ///
    /// A missing file is not an error: the defaults are used and a line is
    /// logged. Anything else that goes wrong reading or parsing is.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file exists but can't be read or
    /// isn't valid TOML for this shape.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on invalid TOML or wrong field types.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// `bind_ip:port`.
    pub fn tcp_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.port)
    }

    /// `bind_ip:udp_port`, falling back to the TCP port.
    pub fn udp_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.udp_port.unwrap_or(self.port))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub(crate) fn tcp_config(&self) -> TcpConfig {
        TcpConfig {
            read_buffer: self.read_buffer_size,
            ..TcpConfig::default()
        }
    }

    pub(crate) fn lobby_config(&self) -> LobbyConfig {
        LobbyConfig {
            tick: TickConfig {
                policy: self.tick_policy.into(),
                ..TickConfig::with_interval(self.tick_interval())
            },
            gameplay_capacity: self.gameplay_capacity,
            control_capacity: self.control_capacity,
            ..LobbyConfig::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: default_bind_ip(),
            port: default_port(),
            udp_port: None,
            game_version: default_game_version(),
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval(),
            tick_policy: TickPolicySetting::default(),
            read_buffer_size: default_read_buffer(),
            udp_buffer_size: default_udp_buffer(),
            outbound_capacity: default_outbound_capacity(),
            gameplay_capacity: default_gameplay_capacity(),
            control_capacity: default_control_capacity(),
        }
    }
}

fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    1338
}
fn default_game_version() -> String {
    "0.1.1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_tick_interval() -> u64 {
    20
}
fn default_read_buffer() -> usize {
    DEFAULT_READ_BUFFER
}
fn default_udp_buffer() -> usize {
    DEFAULT_UDP_BUFFER
}
fn default_outbound_capacity() -> usize {
    1024
}
fn default_gameplay_capacity() -> usize {
    100
}
fn default_control_capacity() -> usize {
    30
}
