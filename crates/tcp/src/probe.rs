//! TCP SYN probe.

use crate::packet::create_tcp_syn_packet;
use hoptrace_common::{ProbePacket, ProbeProtocol, Protocol, TracerouteError};
use rand::{Rng, RngCore};
use std::net::Ipv4Addr;

/// Lowest source port picked for a probe.
const MIN_SOURCE_PORT: u16 = 1024;

/// Raw TCP SYN probe sent to the probe's port.
///
/// Source port and sequence number are drawn from the caller's generator.
/// Reply matching is not implemented for TCP.
#[derive(Debug, Clone, Copy)]
pub struct TcpProbe {
    source: Ipv4Addr,
    destination: Ipv4Addr,
}

impl TcpProbe {
    /// `source` and `destination` feed the checksum pseudo-header.
    pub fn new(source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        Self {
            source,
            destination,
        }
    }
}

impl ProbeProtocol for TcpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Tcp
    }

    fn build_probe(
        &self,
        current_port: u16,
        rng: &mut dyn RngCore,
    ) -> Result<ProbePacket, TracerouteError> {
        let src_port = rng.gen_range(MIN_SOURCE_PORT..=u16::MAX);
        let seq = rng.next_u32();
        Ok(ProbePacket {
            bytes: create_tcp_syn_packet(
                self.source,
                self.destination,
                src_port,
                current_port,
                seq,
            )?,
            port: current_port,
        })
    }

    fn is_valid_response(&self, _icmp: &[u8], _current_port: u16) -> Result<bool, TracerouteError> {
        Err(TracerouteError::ProtocolNotImplemented {
            protocol: Protocol::Tcp,
            operation: "response validation",
        })
    }
}
