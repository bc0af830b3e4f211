use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("probe timed out after {0}ms")]
    ProbeTimeout(u64),

    #[error("connection refused: {0}")]
    ProbeRefused(String),

    #[error("ICMP probing unavailable: {0}")]
    ProbeUnsupported(String),

    #[error("failed to persist host state: {0}")]
    PersistenceFailure(String),

    #[error("cannot resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("invalid host: {0}")]
    InvalidHost(String),

    #[error("host {name} ({ip}) already exists")]
    DuplicateHost { name: String, ip: String },

    #[error("host {0} not found")]
    HostNotFound(i64),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = MonitorError> = std::result::Result<T, E>;
