//! Leaf probes: one TCP connect per port, one ICMP burst per host.

pub mod host;
pub mod port;
pub mod resolve;

pub use host::{HostProber, IcmpProber};
pub use port::probe_port;
pub use resolve::AddressResolver;
