use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use lan_monitor::api;
use lan_monitor::config::{MonitorConfig, DEFAULT_CONFIG_PATH};
use lan_monitor::probe::IcmpProber;
use lan_monitor::store::JsonFileStore;
use lan_monitor::{utils, Monitor};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    utils::init_logging();

    let config_path = std::env::var("LAN_MONITOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = MonitorConfig::load(&config_path).with_context(|| format!("Failed to load {}", config_path))?;

    let store = Arc::new(JsonFileStore::new(&config.data_file));
    let prober = Arc::new(IcmpProber::new(&config.probe));
    let monitor = Arc::new(Monitor::new(&config, prober, store));
    info!(hosts_file = %config.data_file.display(), "LAN Monitor running");

    if let Some(secs) = config.check_interval_secs {
        let scheduled = Arc::clone(&monitor);
        tokio::spawn(async move {
            scheduled.run_scheduled(Duration::from_secs(secs)).await;
        });
    }

    let app = api::create_router(Arc::clone(&monitor), &config.public_dir);
    let bind_address = config.bind_address.clone();
    let api_port = config.api_port;
    let server = tokio::spawn(async move { api::start_server(&bind_address, api_port, app).await });

    tokio::select! {
        res = server => {
            res.context("API server task panicked")?.context("API server failed")?;
        }
        res = signal::ctrl_c() => {
            res?;
            info!("Shutdown signal received. Closing LAN Monitor...");
        }
    }

    Ok(())
}
