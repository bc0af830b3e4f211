use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;

use crate::error::MonitorError;
use crate::models::PortResult;

/// TCP handshake against `address:port`. The socket is dropped as soon as it
/// connects; every outcome ends up in the returned `PortResult`.
pub async fn probe_port(address: IpAddr, port: u16, timeout: Duration) -> PortResult {
    let outcome = connect(SocketAddr::new(address, port), timeout).await;
    if let Err(e) = &outcome {
        debug!(ip = %address, port, error = %e, "port probe failed");
    }
    PortResult::from_outcome(port, outcome)
}

async fn connect(addr: SocketAddr, limit: Duration) -> Result<f64, MonitorError> {
    let start = Instant::now();
    match tokio::time::timeout(limit, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;
            drop(stream);
            Ok(elapsed)
        }
        Ok(Err(e)) => Err(MonitorError::ProbeRefused(e.to_string())),
        Err(_) => Err(MonitorError::ProbeTimeout(limit.as_millis() as u64)),
    }
}
