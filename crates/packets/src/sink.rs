//! Packet transmission sink trait.

use std::io;
use std::net::SocketAddrV4;

/// Send side of a trace: one socket, one owner.
pub trait PacketSink {
    /// Sets the IP time-to-live of subsequent probes.
    fn set_ttl(&mut self, ttl: u8) -> io::Result<()>;

    /// Writes one probe to `addr`. Returns the number of bytes sent.
    fn send_to(&mut self, buf: &[u8], addr: SocketAddrV4) -> io::Result<usize>;
}
