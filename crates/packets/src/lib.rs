//! Packet IO abstractions, header decoding and checksums.

pub mod checksum;
pub mod parser;
mod sink;
mod source;

#[cfg(unix)]
mod socket;

pub use checksum::{checksum, write_checksum};
pub use parser::{
    ipv4_pseudo_header, parse_icmp_header, parse_icmp_quote, parse_ipv4_header,
    parse_udp_first_bytes, IcmpHeader, Ipv4Header, UdpInfo,
};
pub use sink::PacketSink;
pub use source::PacketSource;

#[cfg(unix)]
pub use socket::{new_source_sink, IcmpSource, SocketSink};

/// The two sockets of a trace.
pub struct SourceSinkHandle {
    pub source: Box<dyn PacketSource + Send>,
    pub sink: Box<dyn PacketSink + Send>,
}
