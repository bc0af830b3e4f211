//! Host liveness monitoring: an ICMP burst and a TCP connect per configured
//! port, run concurrently for every host, folded into one verdict per host.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod probe;
pub mod store;
pub mod utils;

pub use engine::Monitor;
pub use error::{MonitorError, Result};
