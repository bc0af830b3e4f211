use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MonitorError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,
    /// Background cycle interval. `None` leaves cycles to `/api/status` callers.
    #[serde(default)]
    pub check_interval_secs: Option<u64>,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub probe: ProbeSettings,
}

fn default_api_port() -> u16 { 3055 }
fn default_bind_address() -> String { "0.0.0.0".into() }
fn default_data_file() -> PathBuf { PathBuf::from("servers.json") }
fn default_public_dir() -> PathBuf { PathBuf::from("public") }
fn default_max_concurrency() -> usize { 1500 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bind_address: default_bind_address(),
            data_file: default_data_file(),
            public_dir: default_public_dir(),
            check_interval_secs: None,
            max_concurrency: default_max_concurrency(),
            probe: ProbeSettings::default(),
        }
    }
}

/// Timeouts and burst size shared by every probe in a cycle.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct ProbeSettings {
    #[serde(default = "default_port_timeout")]
    pub port_timeout_ms: u64,
    #[serde(default = "default_ping_count")]
    pub ping_count: u16,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u64,
    /// Upper bound on a hostname lookup before any probe of that host starts.
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_ms: u64,
}

pub fn default_port_timeout() -> u64 { 1500 }
pub fn default_ping_count() -> u16 { 2 }
pub fn default_ping_timeout() -> u64 { 2000 }
pub fn default_resolve_timeout() -> u64 { 1500 }

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            port_timeout_ms: default_port_timeout(),
            ping_count: default_ping_count(),
            ping_timeout_ms: default_ping_timeout(),
            resolve_timeout_ms: default_resolve_timeout(),
        }
    }
}

impl ProbeSettings {
    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }
}

impl MonitorConfig {
    /// Reads `path` if it exists, otherwise starts from defaults. `PORT`
    /// from the environment wins over the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str::<MonitorConfig>(&content)?
        } else {
            MonitorConfig::default()
        };

        if let Ok(port) = std::env::var("PORT") {
            config.api_port = port
                .parse()
                .map_err(|_| MonitorError::Config(format!("PORT is not a valid port: {port}")))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.ping_count == 0 {
            return Err(MonitorError::Config("probe.ping_count must be at least 1".into()));
        }
        if self.probe.port_timeout_ms == 0 || self.probe.ping_timeout_ms == 0 || self.probe.resolve_timeout_ms == 0 {
            return Err(MonitorError::Config("probe timeouts must be greater than zero".into()));
        }
        if self.max_concurrency == 0 {
            return Err(MonitorError::Config("max_concurrency must be at least 1".into()));
        }
        if self.check_interval_secs == Some(0) {
            return Err(MonitorError::Config("check_interval_secs must be greater than zero".into()));
        }
        Ok(())
    }
}

/// One monitored host as persisted in the host store.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub id: i64,
    pub name: String,
    pub ip: String,
    #[serde(default, deserialize_with = "deserialize_ports")]
    pub ports: Vec<u16>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Keeps the usable entries of a stored port list. Records written by older
/// dashboards can carry `null` where a form value was not numeric.
fn deserialize_ports<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u16>, D::Error> {
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .iter()
        .filter_map(|entry| match entry {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .filter_map(|port| u16::try_from(port).ok())
        .filter(|port| *port != 0)
        .collect())
}
