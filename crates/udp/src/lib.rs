//! UDP traceroute probes.

mod probe;

pub use probe::UdpProbe;
