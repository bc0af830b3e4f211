//! Host records: the list every cycle checks, and the `lastSeen` stamps the
//! checker writes back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::HostConfig;
use crate::error::{MonitorError, Result};

#[async_trait]
pub trait HostStore: Send + Sync {
    async fn list(&self) -> Result<Vec<HostConfig>>;

    async fn set_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn add(&self, host: NewHost) -> Result<HostConfig>;

    async fn delete(&self, id: i64) -> Result<()>;
}

/// Creation request for a host record.
#[derive(Debug, Clone, Deserialize)]
pub struct NewHost {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub ports: PortList,
}

/// Ports as the dashboard form sends them: a JSON array or `"22, 80,443"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortList {
    List(Vec<PortEntry>),
    Csv(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortEntry {
    Number(i64),
    Text(String),
}

impl Default for PortList {
    fn default() -> Self {
        PortList::List(Vec::new())
    }
}

impl PortList {
    /// Parses and validates every entry, dropping repeats but keeping the
    /// first-seen order.
    pub fn parse(&self) -> Result<Vec<u16>> {
        let raw: Vec<String> = match self {
            PortList::List(entries) => entries
                .iter()
                .map(|e| match e {
                    PortEntry::Number(n) => n.to_string(),
                    PortEntry::Text(s) => s.trim().to_string(),
                })
                .collect(),
            PortList::Csv(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        };

        let mut ports = Vec::with_capacity(raw.len());
        for entry in raw.into_iter().filter(|p| !p.is_empty()) {
            let port = entry
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| MonitorError::InvalidHost(format!("invalid port: {entry}")))?;
            if !ports.contains(&port) {
                ports.push(port);
            }
        }
        Ok(ports)
    }
}

/// JSON array on disk. Every read-modify-write holds `lock`, so concurrent
/// `set_last_seen` calls from overlapping cycles cannot drop each other.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

/// File contents split into usable records and the raw ones that could not
/// be read; the latter are written back untouched.
#[derive(Default)]
struct HostFile {
    hosts: Vec<HostConfig>,
    unreadable: Vec<Value>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<HostFile> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => return Ok(HostFile::default()),
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HostFile::default()),
            Err(e) => return Err(e.into()),
        };

        let records: Vec<Value> = serde_json::from_str(&content)?;
        let mut file = HostFile::default();
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<HostConfig>(record.clone()) {
                Ok(host) => file.hosts.push(host),
                Err(e) => {
                    warn!(path = %self.path.display(), index, error = %e, "skipping unreadable host record");
                    file.unreadable.push(record);
                }
            }
        }
        Ok(file)
    }

    async fn write(&self, file: &HostFile) -> Result<()> {
        let mut records = Vec::with_capacity(file.hosts.len() + file.unreadable.len());
        for host in &file.hosts {
            records.push(serde_json::to_value(host)?);
        }
        records.extend(file.unreadable.iter().cloned());

        let body = serde_json::to_string_pretty(&records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl HostStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<HostConfig>> {
        let _guard = self.lock.lock().await;
        match self.read().await {
            Ok(file) => Ok(file.hosts),
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "failed to read host file");
                Ok(Vec::new())
            }
        }
    }

    async fn set_last_seen(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let host = file.hosts.iter_mut().find(|h| h.id == id).ok_or(MonitorError::HostNotFound(id))?;
        host.last_seen = Some(at);
        self.write(&file)
            .await
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))
    }

    async fn add(&self, new: NewHost) -> Result<HostConfig> {
        let name = new.name.trim();
        let ip = new.ip.trim();
        if name.is_empty() || ip.is_empty() {
            return Err(MonitorError::InvalidHost("Missing fields".into()));
        }
        let ports = new.ports.parse()?;

        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        if file.hosts.iter().any(|h| h.name == name && h.ip == ip) {
            return Err(MonitorError::DuplicateHost { name: name.to_string(), ip: ip.to_string() });
        }

        let next_free = file.hosts.iter().map(|h| h.id + 1).max().unwrap_or(0);
        let host = HostConfig {
            id: Utc::now().timestamp_millis().max(next_free),
            name: name.to_string(),
            ip: ip.to_string(),
            ports,
            last_seen: None,
        };
        file.hosts.push(host.clone());
        self.write(&file).await?;

        info!(id = host.id, host = %host.name, ip = %host.ip, ports = ?host.ports, "host added");
        Ok(host)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = self.read().await?;
        let before = file.hosts.len();
        file.hosts.retain(|h| h.id != id);
        if file.hosts.len() == before {
            return Err(MonitorError::HostNotFound(id));
        }
        self.write(&file).await?;
        info!(id, "host deleted");
        Ok(())
    }
}
