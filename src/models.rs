use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::error::MonitorError;

/// Why a port probe did not connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PortError {
    Timeout,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortResult {
    pub port: u16,
    pub is_open: bool,
    pub connect_time_ms: Option<f64>,
    pub error: Option<PortError>,
}

impl PortResult {
    pub fn open(port: u16, connect_time_ms: f64) -> Self {
        Self { port, is_open: true, connect_time_ms: Some(connect_time_ms), error: None }
    }

    pub fn failed(port: u16, error: PortError) -> Self {
        Self { port, is_open: false, connect_time_ms: None, error: Some(error) }
    }

    pub fn from_outcome(port: u16, outcome: Result<f64, MonitorError>) -> Self {
        match outcome {
            Ok(ms) => Self::open(port, ms),
            Err(MonitorError::ProbeTimeout(_)) => Self::failed(port, PortError::Timeout),
            Err(_) => Self::failed(port, PortError::Closed),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostProbeResult {
    pub reachable: bool,
    pub avg_rtt_ms: Option<f64>,
    pub packet_loss_percent: f64,
}

impl HostProbeResult {
    pub fn unreachable() -> Self {
        Self { reachable: false, avg_rtt_ms: None, packet_loss_percent: 100.0 }
    }

    /// Folds the round-trip times of the answered echoes out of `sent`.
    pub fn from_replies(sent: u16, rtts_ms: &[f64]) -> Self {
        if sent == 0 || rtts_ms.is_empty() {
            return Self::unreachable();
        }
        let answered = rtts_ms.len().min(sent as usize);
        let avg = rtts_ms.iter().sum::<f64>() / rtts_ms.len() as f64;
        Self {
            reachable: true,
            avg_rtt_ms: Some(avg),
            packet_loss_percent: (sent as usize - answered) as f64 / sent as f64 * 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostResult {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub is_alive: bool,
    pub effective_latency_ms: Option<f64>,
    pub packet_loss_percent: Option<f64>,
    pub last_seen: Option<DateTime<Utc>>,
    pub ports: Vec<PortResult>,
}

pub type CheckBatch = Vec<HostResult>;

/// Shared between the scheduler and `/api/stats`.
#[derive(Debug, Default)]
pub struct MonitorState {
    pub last_batch: CheckBatch,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Wire shape of a `HostResult` as the dashboard consumes it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatusView {
    pub id: i64,
    pub name: String,
    pub ip: String,
    pub is_alive: bool,
    pub response_time: Option<u64>,
    #[serde(serialize_with = "serialize_packet_loss")]
    pub packet_loss: Option<f64>,
    pub last_seen: Option<i64>,
    pub port_status: Vec<PortStatusView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortStatusView {
    pub port: u16,
    pub is_open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PortError>,
}

fn serialize_packet_loss<S: Serializer>(loss: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match loss {
        Some(percent) => s.serialize_f64(*percent),
        None => s.serialize_str("unknown"),
    }
}

fn round_ms(ms: f64) -> u64 {
    ms.max(0.0).round() as u64
}

impl From<&PortResult> for PortStatusView {
    fn from(port: &PortResult) -> Self {
        Self {
            port: port.port,
            is_open: port.is_open,
            time: if port.is_open { port.connect_time_ms.map(round_ms) } else { None },
            error: if port.is_open { None } else { Some(port.error.unwrap_or(PortError::Closed)) },
        }
    }
}

impl From<&HostResult> for HostStatusView {
    fn from(host: &HostResult) -> Self {
        Self {
            id: host.id,
            name: host.name.clone(),
            ip: host.address.clone(),
            is_alive: host.is_alive,
            response_time: host.effective_latency_ms.map(round_ms),
            packet_loss: host.packet_loss_percent,
            last_seen: host.last_seen.map(|t| t.timestamp_millis()),
            port_status: host.ports.iter().map(PortStatusView::from).collect(),
        }
    }
}
