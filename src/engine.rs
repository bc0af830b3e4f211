use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{HostConfig, MonitorConfig, ProbeSettings};
use crate::error::Result;
use crate::models::{CheckBatch, HostProbeResult, HostResult, MonitorState, PortError, PortResult};
use crate::probe::{probe_port, AddressResolver, HostProber};
use crate::store::HostStore;

pub struct Monitor {
    settings: ProbeSettings,
    prober: Arc<dyn HostProber>,
    store: Arc<dyn HostStore>,
    resolver: AddressResolver,
    pub state: Arc<Mutex<MonitorState>>,
    concurrency_limiter: Arc<Semaphore>,
}

impl Monitor {
    pub fn new(config: &MonitorConfig, prober: Arc<dyn HostProber>, store: Arc<dyn HostStore>) -> Self {
        Self {
            settings: config.probe,
            prober,
            store,
            resolver: AddressResolver::new(config.probe.resolve_timeout()),
            state: Arc::new(Mutex::new(MonitorState::default())),
            concurrency_limiter: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
        }
    }

    /// Replaces the system-configured resolver.
    pub fn with_resolver(mut self, resolver: AddressResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store(&self) -> &Arc<dyn HostStore> {
        &self.store
    }

    /// Runs one cycle per tick until the task is dropped. Cycles are awaited
    /// inline, so this loop never overlaps itself; late ticks are skipped.
    pub async fn run_scheduled(self: Arc<Self>, every: Duration) {
        info!(interval_secs = every.as_secs(), "Scheduled checks active");
        let mut timer = tokio::time::interval(every);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            match self.run_configured_cycle().await {
                Ok(batch) => {
                    let mut state = self.state.lock().await;
                    state.last_batch = batch;
                    state.completed_at = Some(Utc::now());
                }
                Err(e) => error!(error = %e, "Scheduled cycle skipped: host list unavailable"),
            }
        }
    }

    /// Lists the hosts from the store and checks all of them.
    pub async fn run_configured_cycle(self: &Arc<Self>) -> Result<CheckBatch> {
        let hosts = self.store.list().await?;
        Ok(self.run_cycle(hosts).await)
    }

    /// Checks every host concurrently. The batch has one entry per input
    /// host, in input order, whatever order the checks finish in.
    pub async fn run_cycle(self: &Arc<Self>, hosts: Vec<HostConfig>) -> CheckBatch {
        let start = Instant::now();

        let handles = hosts.iter().cloned().map(|host| {
            let monitor = Arc::clone(self);
            tokio::spawn(async move {
                let _permit = monitor.concurrency_limiter.acquire().await.ok();
                monitor.check_host(&host).await
            })
        });
        let joined = join_all(handles).await;

        let batch: CheckBatch = hosts
            .iter()
            .zip(joined)
            .map(|(host, outcome)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    error!(host = %host.name, ip = %host.ip, error = %e, "Host check task failed");
                    degraded(host)
                }
            })
            .collect();

        let alive = batch.iter().filter(|r| r.is_alive).count();
        info!(
            hosts = batch.len(),
            alive,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Check cycle completed"
        );
        batch
    }

    /// Host probe and every port probe run at the same time; the result is
    /// built once all of them have finished.
    pub async fn check_host(&self, host: &HostConfig) -> HostResult {
        let ip = match self.resolver.resolve(&host.ip).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(host = %host.name, error = %e, "Address resolution failed");
                let ports = host.ports.iter().map(|&p| PortResult::failed(p, PortError::Closed)).collect();
                return aggregate(host, HostProbeResult::unreachable(), ports);
            }
        };

        let port_timeout = self.settings.port_timeout();
        let (probe, ports) = tokio::join!(
            self.prober.probe(ip),
            join_all(host.ports.iter().map(|&port| probe_port(ip, port, port_timeout))),
        );

        let result = aggregate(host, probe, ports);
        debug!(
            host = %host.name,
            %ip,
            alive = result.is_alive,
            latency_ms = ?result.effective_latency_ms,
            "Host checked"
        );

        if result.is_alive {
            self.record_last_seen(host.id);
        }
        result
    }

    /// Detached write; the cycle never waits on it and a failure only logs.
    fn record_last_seen(&self, id: i64) {
        let store = Arc::clone(&self.store);
        let now = Utc::now();
        tokio::spawn(async move {
            if let Err(e) = store.set_last_seen(id, now).await {
                warn!(id, error = %e, "Failed to record last seen");
            }
        });
    }
}

/// Liveness: ICMP reply or any open port. `last_seen` is echoed from the
/// input record, i.e. the value before this cycle.
pub fn aggregate(host: &HostConfig, probe: HostProbeResult, ports: Vec<PortResult>) -> HostResult {
    let is_alive = probe.reachable || ports.iter().any(|p| p.is_open);
    HostResult {
        id: host.id,
        name: host.name.clone(),
        address: host.ip.clone(),
        is_alive,
        effective_latency_ms: effective_latency(&probe, &ports),
        packet_loss_percent: Some(probe.packet_loss_percent),
        last_seen: host.last_seen,
        ports,
    }
}

/// ICMP average when there is one, else the mean connect time of open ports.
pub fn effective_latency(probe: &HostProbeResult, ports: &[PortResult]) -> Option<f64> {
    if let Some(rtt) = probe.avg_rtt_ms {
        return Some(rtt);
    }
    let times: Vec<f64> = ports.iter().filter(|p| p.is_open).filter_map(|p| p.connect_time_ms).collect();
    if times.is_empty() {
        None
    } else {
        Some(times.iter().sum::<f64>() / times.len() as f64)
    }
}

fn degraded(host: &HostConfig) -> HostResult {
    HostResult {
        id: host.id,
        name: host.name.clone(),
        address: host.ip.clone(),
        is_alive: false,
        effective_latency_ms: None,
        packet_loss_percent: None,
        last_seen: host.last_seen,
        ports: host.ports.iter().map(|&p| PortResult::failed(p, PortError::Closed)).collect(),
    }
}
