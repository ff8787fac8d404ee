// src/config.rs

//! Pool and per-connection policy configuration: loading, presets per
//! legacy-server family, and validated defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// Effective timeout/interval configuration for one connection record.
/// Immutable after the record is created; values usually come from a
/// [`ServerPreset`], with individual fields overridden by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectionPolicy {
    /// Bound on the control-channel handshake when connecting or reconnecting.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,
    /// Bound on individual data transfers once a data channel is open.
    #[serde(default = "default_data_timeout_secs")]
    pub data_timeout_secs: u64,
    /// Cadence of the keepalive probe. Must stay below the remote server's
    /// idle-disconnect timer, which on legacy hosts can be under a minute.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    /// Reconnect attempts before a record is declared dead.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay between reconnect attempts.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Bound on establishing a passive-mode data connection.
    #[serde(default = "default_pasv_timeout_secs")]
    pub pasv_timeout_secs: u64,
    /// Bound on data-channel inactivity during a transfer.
    #[serde(default = "default_data_channel_timeout_secs")]
    pub data_channel_timeout_secs: u64,
    /// Per-host session cap. Legacy servers allow very few simultaneous
    /// connections per client. `0` disables the check.
    #[serde(default = "default_max_connections_per_host")]
    pub max_connections_per_host: usize,
    /// Records unused for longer than this are evicted by the idle reaper.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// If true, every command issued on the session is logged at debug level.
    #[serde(default)]
    pub log_commands: bool,
}

fn default_connection_timeout_secs() -> u64 {
    30
}
fn default_data_timeout_secs() -> u64 {
    30
}
fn default_keepalive_interval_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_pasv_timeout_secs() -> u64 {
    30
}
fn default_data_channel_timeout_secs() -> u64 {
    60
}
fn default_max_connections_per_host() -> usize {
    4
}
fn default_idle_timeout_secs() -> u64 {
    300
}

impl Default for ConnectionPolicy {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout_secs(),
            data_timeout_secs: default_data_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            pasv_timeout_secs: default_pasv_timeout_secs(),
            data_channel_timeout_secs: default_data_channel_timeout_secs(),
            max_connections_per_host: default_max_connections_per_host(),
            idle_timeout_secs: default_idle_timeout_secs(),
            log_commands: false,
        }
    }
}

impl ConnectionPolicy {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_secs(self.data_timeout_secs)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn pasv_timeout(&self) -> Duration {
        Duration::from_secs(self.pasv_timeout_secs)
    }

    pub fn data_channel_timeout(&self) -> Duration {
        Duration::from_secs(self.data_channel_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

/// Known legacy-server families, each mapped to a conservative policy.
/// A caller selects a preset and may override any individual field.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ServerPreset {
    /// Old Unix FTP daemons with aggressive idle timers.
    #[default]
    GenericLegacy,
    /// Windows/IIS-style servers: tolerant idle timers, slow PASV setup.
    WindowsIis,
    /// Oversubscribed shared hosting: very low connection caps, slow logins.
    SharedHosting,
    /// Modern servers that behave; mostly here so overrides have a clean base.
    Modern,
}

impl ServerPreset {
    /// The pre-selected policy for this server family.
    pub fn policy(self) -> ConnectionPolicy {
        match self {
            ServerPreset::GenericLegacy => ConnectionPolicy::default(),
            ServerPreset::WindowsIis => ConnectionPolicy {
                keepalive_interval_secs: 60,
                idle_timeout_secs: 240,
                pasv_timeout_secs: 45,
                data_timeout_secs: 45,
                ..ConnectionPolicy::default()
            },
            ServerPreset::SharedHosting => ConnectionPolicy {
                connection_timeout_secs: 45,
                keepalive_interval_secs: 25,
                idle_timeout_secs: 180,
                retry_delay_ms: 5000,
                max_connections_per_host: 2,
                ..ConnectionPolicy::default()
            },
            ServerPreset::Modern => ConnectionPolicy {
                connection_timeout_secs: 15,
                data_timeout_secs: 20,
                keepalive_interval_secs: 120,
                idle_timeout_secs: 600,
                max_retries: 2,
                retry_delay_ms: 1000,
                max_connections_per_host: 8,
                ..ConnectionPolicy::default()
            },
        }
    }
}

/// Process-wide settings for the connection pool itself.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PoolConfig {
    /// Sweep cadence of the idle reaper.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Policy applied to connections registered without an explicit one.
    #[serde(default)]
    pub default_preset: ServerPreset,
}

fn default_reap_interval_secs() -> u64 {
    60
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            reap_interval_secs: default_reap_interval_secs(),
            default_preset: ServerPreset::default(),
        }
    }
}

impl PoolConfig {
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    pub fn default_policy(&self) -> ConnectionPolicy {
        self.default_preset.policy()
    }

    /// Loads pool configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: PoolConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file at '{path}'"))?;
        Ok(config)
    }
}
