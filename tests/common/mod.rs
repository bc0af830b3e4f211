#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::Duration;

use lan_monitor::config::HostConfig;
use lan_monitor::models::HostProbeResult;
use lan_monitor::probe::HostProber;
use lan_monitor::store::{HostStore, NewHost};
use lan_monitor::{MonitorError, Result};

/// Scripted ICMP stand-in: per-IP reply and delay; unknown IPs never answer.
#[derive(Default)]
pub struct FakeProber {
    replies: HashMap<IpAddr, (HostProbeResult, Duration)>,
    panic_on: Option<IpAddr>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, ip: &str, rtt_ms: f64) -> Self {
        let result = HostProbeResult::from_replies(2, &[rtt_ms, rtt_ms]);
        self.replies.insert(ip.parse().unwrap(), (result, Duration::ZERO));
        self
    }

    pub fn delayed(mut self, ip: &str, result: HostProbeResult, delay: Duration) -> Self {
        self.replies.insert(ip.parse().unwrap(), (result, delay));
        self
    }

    pub fn panic_on(mut self, ip: &str) -> Self {
        self.panic_on = Some(ip.parse().unwrap());
        self
    }
}

#[async_trait]
impl HostProber for FakeProber {
    async fn probe(&self, address: IpAddr) -> HostProbeResult {
        if self.panic_on == Some(address) {
            panic!("prober blew up for {address}");
        }
        match self.replies.get(&address) {
            Some((result, delay)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(*delay).await;
                }
                result.clone()
            }
            None => HostProbeResult::unreachable(),
        }
    }
}

/// Fixed host list that counts `set_last_seen` calls per id.
pub struct CountingStore {
    hosts: Vec<HostConfig>,
    pub calls: Mutex<HashMap<i64, usize>>,
    fail_writes: bool,
}

impl CountingStore {
    pub fn new(hosts: Vec<HostConfig>) -> Self {
        Self { hosts, calls: Mutex::new(HashMap::new()), fail_writes: false }
    }

    pub fn failing(hosts: Vec<HostConfig>) -> Self {
        Self { fail_writes: true, ..Self::new(hosts) }
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, id: i64) -> usize {
        self.calls.lock().unwrap().get(&id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl HostStore for CountingStore {
    async fn list(&self) -> Result<Vec<HostConfig>> {
        Ok(self.hosts.clone())
    }

    async fn set_last_seen(&self, id: i64, _at: DateTime<Utc>) -> Result<()> {
        *self.calls.lock().unwrap().entry(id).or_insert(0) += 1;
        if self.fail_writes {
            return Err(MonitorError::PersistenceFailure("disk full".into()));
        }
        Ok(())
    }

    async fn add(&self, _host: NewHost) -> Result<HostConfig> {
        Err(MonitorError::InvalidHost("read-only store".into()))
    }

    async fn delete(&self, id: i64) -> Result<()> {
        Err(MonitorError::HostNotFound(id))
    }
}

pub fn host(id: i64, ip: &str, ports: Vec<u16>) -> HostConfig {
    HostConfig { id, name: format!("host-{id}"), ip: ip.into(), ports, last_seen: None }
}
