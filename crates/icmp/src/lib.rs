//! ICMP traceroute probes.

mod packet;
mod probe;

pub use packet::{create_icmp_echo_packet, ECHO_PAYLOAD, ECHO_PAYLOAD_LEN};
pub use probe::IcmpProbe;
