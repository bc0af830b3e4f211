use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::system_conf::read_system_conf;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::MonitorError;

/// Turns a configured host address into the IP every probe of a host shares.
/// Lookups are cut off at `limit` no matter how the nameservers behave.
pub struct AddressResolver {
    dns: TokioResolver,
    limit: Duration,
}

impl AddressResolver {
    /// Uses the system resolver configuration, falling back to Cloudflare
    /// when none can be read.
    pub fn new(limit: Duration) -> Self {
        let config = match read_system_conf() {
            Ok((config, _)) => config,
            Err(e) => {
                warn!(error = %e, "no system resolver config, using Cloudflare 1.1.1.1 / 1.0.0.1");
                ResolverConfig::cloudflare()
            }
        };
        Self::with_config(config, limit)
    }

    pub fn with_config(config: ResolverConfig, limit: Duration) -> Self {
        info!(
            name_servers = config.name_servers().len(),
            timeout_ms = limit.as_millis() as u64,
            "DNS resolver configured"
        );
        let dns = TokioResolver::builder_with_config(config, TokioConnectionProvider::default()).build();
        Self { dns, limit }
    }

    pub async fn resolve(&self, address: &str) -> Result<IpAddr, MonitorError> {
        let address = address.trim();
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }
        let failed = |reason: String| MonitorError::Resolve { host: address.to_string(), reason };

        let lookup = tokio::time::timeout(self.limit, self.dns.lookup_ip(address))
            .await
            .map_err(|_| failed(format!("no answer within {}ms", self.limit.as_millis())))?
            .map_err(|e| failed(e.to_string()))?;
        lookup.iter().next().ok_or_else(|| failed("no IP address found".into()))
    }
}
