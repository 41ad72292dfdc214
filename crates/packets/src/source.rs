//! Packet capture source trait.

use std::io;
use std::time::Duration;

/// Receive side of a trace: a raw ICMP socket.
///
/// Every ICMP message delivered to the host shows up here, not only the
/// replies to our probes.
pub trait PacketSource {
    /// Blocks until a datagram is ready or `timeout` elapses.
    ///
    /// Returns `Ok(false)` when the timeout elapsed with nothing to read.
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Reads one datagram, starting at its IPv4 header, into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}
