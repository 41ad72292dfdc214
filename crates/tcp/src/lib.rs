//! TCP SYN traceroute probes.

mod packet;
mod probe;

pub use packet::{create_tcp_syn_packet, TCP_WINDOW_SIZE};
pub use probe::TcpProbe;
