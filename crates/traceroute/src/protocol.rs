//! Protocol dispatch for the trace loop.

use hoptrace_common::{ProbePacket, ProbeProtocol, Protocol, TraceParameters, TracerouteError};
use hoptrace_gre::GreProbe;
use hoptrace_icmp::{IcmpProbe, ECHO_PAYLOAD_LEN};
use hoptrace_packets::parser::{ICMP_HEADER_LEN, TCP_HEADER_LEN};
use hoptrace_tcp::TcpProbe;
use hoptrace_udp::UdpProbe;
use rand::RngCore;

/// The probe implementation selected for a run.
#[derive(Debug, Clone, Copy)]
pub enum ProbeKind {
    Udp(UdpProbe),
    Icmp(IcmpProbe),
    Tcp(TcpProbe),
    Gre(GreProbe),
}

impl ProbeKind {
    /// Picks the implementation for `params.protocol`.
    ///
    /// ICMP probes are identified by the low 16 bits of the process id.
    pub fn from_params(params: &TraceParameters) -> Self {
        match params.protocol {
            Protocol::Udp => Self::Udp(UdpProbe::new(params.packet_len)),
            Protocol::Icmp => Self::Icmp(IcmpProbe::for_current_process()),
            Protocol::Tcp => Self::Tcp(TcpProbe::new(params.source, params.destination)),
            Protocol::Gre => Self::Gre(GreProbe::new()),
        }
    }

    /// Bytes handed to the send socket per probe. GRE sends nothing.
    pub fn probe_len(&self) -> usize {
        match self {
            Self::Udp(p) => p.packet_len(),
            Self::Icmp(_) => ICMP_HEADER_LEN + ECHO_PAYLOAD_LEN,
            Self::Tcp(_) => TCP_HEADER_LEN,
            Self::Gre(_) => 0,
        }
    }

    fn inner(&self) -> &dyn ProbeProtocol {
        match self {
            Self::Udp(p) => p,
            Self::Icmp(p) => p,
            Self::Tcp(p) => p,
            Self::Gre(p) => p,
        }
    }
}

impl ProbeProtocol for ProbeKind {
    fn protocol(&self) -> Protocol {
        self.inner().protocol()
    }

    fn build_probe(
        &self,
        current_port: u16,
        rng: &mut dyn RngCore,
    ) -> Result<ProbePacket, TracerouteError> {
        self.inner().build_probe(current_port, rng)
    }

    fn is_valid_response(&self, icmp: &[u8], current_port: u16) -> Result<bool, TracerouteError> {
        self.inner().is_valid_response(icmp, current_port)
    }
}
