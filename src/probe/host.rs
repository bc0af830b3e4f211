use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, ICMP};
use tracing::{debug, info, warn};

use crate::config::ProbeSettings;
use crate::error::MonitorError;
use crate::models::HostProbeResult;

const ECHO_PAYLOAD: [u8; 56] = [0u8; 56];
const ECHO_GAP: Duration = Duration::from_millis(50);

/// Host-level reachability check. Implementations never fail: an unreachable
/// or unprobeable host is reported through the result.
#[async_trait]
pub trait HostProber: Send + Sync {
    async fn probe(&self, address: IpAddr) -> HostProbeResult;
}

/// ICMP echo prober. One raw/datagram socket per address family, opened once
/// and shared by every probe of every cycle.
pub struct IcmpProber {
    v4: Option<PingClient>,
    v6: Option<PingClient>,
    count: u16,
    timeout: Duration,
}

impl IcmpProber {
    pub fn new(settings: &ProbeSettings) -> Self {
        let v4 = open_client(ICMP::V4, "ICMPv4");
        let v6 = open_client(ICMP::V6, "ICMPv6");
        if v4.is_some() || v6.is_some() {
            info!(
                count = settings.ping_count,
                timeout_ms = settings.ping_timeout_ms,
                ipv4 = v4.is_some(),
                ipv6 = v6.is_some(),
                "ICMP prober ready"
            );
        }
        Self {
            v4,
            v6,
            count: settings.ping_count.max(1),
            timeout: settings.ping_timeout(),
        }
    }

    fn client_for(&self, address: IpAddr) -> Option<&PingClient> {
        match address {
            IpAddr::V4(_) => self.v4.as_ref(),
            IpAddr::V6(_) => self.v6.as_ref(),
        }
    }
}

fn open_client(kind: ICMP, label: &str) -> Option<PingClient> {
    let config = PingConfig::builder().kind(kind).build();
    match PingClient::new(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            let err = MonitorError::ProbeUnsupported(format!("{label}: {e}"));
            warn!(error = %err, "host probes for this address family will report 100% loss");
            None
        }
    }
}

#[async_trait]
impl HostProber for IcmpProber {
    async fn probe(&self, address: IpAddr) -> HostProbeResult {
        let Some(client) = self.client_for(address) else {
            return HostProbeResult::unreachable();
        };

        let mut pinger = client.pinger(address, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        let mut rtts = Vec::with_capacity(self.count as usize);
        for seq in 0..self.count {
            match pinger.ping(PingSequence(seq), &ECHO_PAYLOAD).await {
                Ok((_, rtt)) => rtts.push(rtt.as_secs_f64() * 1000.0),
                Err(e) => debug!(ip = %address, seq, error = %e, "echo unanswered"),
            }
            if seq + 1 < self.count {
                tokio::time::sleep(ECHO_GAP).await;
            }
        }

        HostProbeResult::from_replies(self.count, &rtts)
    }
}
