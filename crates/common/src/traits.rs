//! Core traits for probe protocol implementations.

use crate::{Protocol, TracerouteError};
use rand::RngCore;

/// A probe ready to be written to the send socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePacket {
    /// Bytes handed to `sendto`. For UDP this is only the payload; the
    /// kernel supplies the headers.
    pub bytes: Vec<u8>,
    /// Destination port placed in the socket address (0 when the protocol has none).
    pub port: u16,
}

/// Build/validate contract shared by UDP, ICMP, TCP and GRE probes.
///
/// The correlation key `current_port` is recomputed by the caller for the
/// probe in flight; implementations keep no per-probe state.
pub trait ProbeProtocol {
    /// The protocol this implementation speaks.
    fn protocol(&self) -> Protocol;

    /// Builds the probe carrying `current_port`.
    ///
    /// `rng` is owned by the orchestrator and seeded once per run.
    fn build_probe(
        &self,
        current_port: u16,
        rng: &mut dyn RngCore,
    ) -> Result<ProbePacket, TracerouteError>;

    /// Decides whether `icmp` (an ICMP message, outer IP header already
    /// stripped) answers the probe keyed by `current_port`.
    ///
    /// Returns `Ok(false)` for other traffic, including truncated packets.
    fn is_valid_response(&self, icmp: &[u8], current_port: u16) -> Result<bool, TracerouteError>;
}
