//! GRE traceroute probes.
//!
//! Neither sending nor reply matching is implemented. Both operations return
//! [`TracerouteError::ProtocolNotImplemented`] so that callers can report
//! the gap instead of tracing silently into timeouts.

use hoptrace_common::{ProbePacket, ProbeProtocol, Protocol, TracerouteError};
use rand::RngCore;

#[derive(Debug, Clone, Copy, Default)]
pub struct GreProbe;

impl GreProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ProbeProtocol for GreProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Gre
    }

    fn build_probe(
        &self,
        _current_port: u16,
        _rng: &mut dyn RngCore,
    ) -> Result<ProbePacket, TracerouteError> {
        Err(TracerouteError::ProtocolNotImplemented {
            protocol: Protocol::Gre,
            operation: "probe sending",
        })
    }

    fn is_valid_response(&self, _icmp: &[u8], _current_port: u16) -> Result<bool, TracerouteError> {
        Err(TracerouteError::ProtocolNotImplemented {
            protocol: Protocol::Gre,
            operation: "response validation",
        })
    }
}
