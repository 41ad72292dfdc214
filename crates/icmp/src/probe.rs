//! ICMP Echo probe and reply matching.

use crate::packet::create_icmp_echo_packet;
use hoptrace_common::{ProbePacket, ProbeProtocol, Protocol, TracerouteError};
use hoptrace_packets::parser::{ICMP_ECHO_REPLY, ICMP_ECHO_REQUEST, ICMP_TIME_EXCEEDED};
use hoptrace_packets::{parse_icmp_header, parse_icmp_quote};
use rand::RngCore;
use tracing::trace;

/// ICMP Echo probe keyed by `(identifier, sequence)`.
///
/// The identifier is fixed for the run (normally the low 16 bits of the
/// process id); the sequence is the probe's port key.
#[derive(Debug, Clone, Copy)]
pub struct IcmpProbe {
    identifier: u16,
}

impl IcmpProbe {
    pub fn new(identifier: u16) -> Self {
        Self { identifier }
    }

    /// Identifier derived from the current process id.
    pub fn for_current_process() -> Self {
        Self::new((std::process::id() & 0xFFFF) as u16)
    }

    pub fn identifier(&self) -> u16 {
        self.identifier
    }

    fn matches(&self, identifier: u16, sequence: u16, current_port: u16) -> bool {
        identifier == self.identifier && sequence == current_port
    }
}

impl ProbeProtocol for IcmpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Icmp
    }

    fn build_probe(
        &self,
        current_port: u16,
        _rng: &mut dyn RngCore,
    ) -> Result<ProbePacket, TracerouteError> {
        Ok(ProbePacket {
            bytes: create_icmp_echo_packet(self.identifier, current_port)?,
            port: 0,
        })
    }

    fn is_valid_response(&self, icmp: &[u8], current_port: u16) -> Result<bool, TracerouteError> {
        let header = match parse_icmp_header(icmp) {
            Ok(header) => header,
            Err(err) => {
                trace!(%err, "icmp: short header");
                return Ok(false);
            }
        };

        match header.icmp_type {
            ICMP_ECHO_REPLY => Ok(self.matches(header.identifier, header.sequence, current_port)),
            ICMP_TIME_EXCEEDED => {
                // The router quotes our echo request: match on the inner
                // header, never on the outer one.
                let inner = parse_icmp_quote(icmp).and_then(|(_, quoted)| parse_icmp_header(quoted));
                match inner {
                    Ok(inner) if inner.icmp_type == ICMP_ECHO_REQUEST => {
                        Ok(self.matches(inner.identifier, inner.sequence, current_port))
                    }
                    Ok(inner) => {
                        trace!(icmp_type = inner.icmp_type, "icmp: quote is not an echo request");
                        Ok(false)
                    }
                    Err(err) => {
                        trace!(%err, "icmp: quote truncated");
                        Ok(false)
                    }
                }
            }
            other => {
                trace!(icmp_type = other, "icmp: ignored message type");
                Ok(false)
            }
        }
    }
}
