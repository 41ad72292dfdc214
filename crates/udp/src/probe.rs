//! UDP probe construction and reply matching.

use hoptrace_common::{ProbePacket, ProbeProtocol, Protocol, TracerouteError};
use hoptrace_packets::parser::IPPROTO_UDP;
use hoptrace_packets::{parse_icmp_quote, parse_udp_first_bytes};
use rand::RngCore;
use tracing::trace;

/// UDP probe: `packet_len` zero bytes sent to the probe's port.
///
/// The kernel's UDP stack writes the header, so only the payload is built
/// here. Replies are matched on the destination port of the quoted UDP
/// header.
#[derive(Debug, Clone, Copy)]
pub struct UdpProbe {
    packet_len: usize,
}

impl UdpProbe {
    /// Creates a UDP probe carrying `packet_len` bytes of payload.
    pub fn new(packet_len: usize) -> Self {
        Self { packet_len }
    }

    /// Payload length in bytes.
    pub fn packet_len(&self) -> usize {
        self.packet_len
    }
}

impl ProbeProtocol for UdpProbe {
    fn protocol(&self) -> Protocol {
        Protocol::Udp
    }

    fn build_probe(
        &self,
        current_port: u16,
        _rng: &mut dyn RngCore,
    ) -> Result<ProbePacket, TracerouteError> {
        Ok(ProbePacket {
            bytes: vec![0u8; self.packet_len],
            port: current_port,
        })
    }

    fn is_valid_response(&self, icmp: &[u8], current_port: u16) -> Result<bool, TracerouteError> {
        let (inner_ip, transport) = match parse_icmp_quote(icmp) {
            Ok(quote) => quote,
            Err(err) => {
                trace!(%err, "udp: no quoted datagram");
                return Ok(false);
            }
        };

        if self.protocol() == Protocol::Udp && inner_ip.protocol != IPPROTO_UDP {
            trace!(protocol = inner_ip.protocol, "udp: quoted datagram is not UDP");
            return Ok(false);
        }

        let udp = match parse_udp_first_bytes(transport) {
            Ok(udp) => udp,
            Err(err) => {
                trace!(%err, "udp: quoted header truncated");
                return Ok(false);
            }
        };

        if udp.dst_port != current_port {
            trace!(
                dst_port = udp.dst_port,
                expected = current_port,
                "udp: port mismatch"
            );
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoptrace_packets::parser::{
        IPPROTO_TCP, ICMP_DEST_UNREACHABLE, ICMP_PORT_UNREACHABLE, ICMP_TIME_EXCEEDED,
    };
    use hoptrace_packets::Ipv4Header;
    use rand::rngs::mock::StepRng;
    use std::net::Ipv4Addr;

    const SOURCE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
    const TARGET: Ipv4Addr = Ipv4Addr::new(93, 184, 216, 34);

    /// ICMP error quoting a UDP datagram sent to `dst_port`.
    fn icmp_error(icmp_type: u8, icmp_code: u8, protocol: u8, dst_port: u16) -> Vec<u8> {
        let mut icmp = vec![icmp_type, icmp_code, 0, 0, 0, 0, 0, 0];
        icmp.extend_from_slice(&Ipv4Header::new(SOURCE, TARGET, protocol, 1, 48).to_bytes());
        icmp.extend_from_slice(&[0xd4, 0x31]);
        icmp.extend_from_slice(&dst_port.to_be_bytes());
        icmp.extend_from_slice(&[0x00, 0x30, 0x00, 0x00]);
        icmp
    }

    #[test]
    fn test_build_probe() {
        let probe = UdpProbe::new(40);
        let packet = probe.build_probe(33437, &mut StepRng::new(0, 1)).unwrap();
        assert_eq!(packet.port, 33437);
        assert_eq!(packet.bytes, vec![0u8; 40]);

        let empty = UdpProbe::new(0)
            .build_probe(33437, &mut StepRng::new(0, 1))
            .unwrap();
        assert!(empty.bytes.is_empty());
    }

    #[test]
    fn test_time_exceeded_matches_only_its_port() {
        let probe = UdpProbe::new(40);
        let packet = icmp_error(ICMP_TIME_EXCEEDED, 0, IPPROTO_UDP, 33440);

        assert!(probe.is_valid_response(&packet, 33440).unwrap());
        for other in [33439, 33441, 0, 65535] {
            assert!(!probe.is_valid_response(&packet, other).unwrap());
        }
    }

    #[test]
    fn test_port_unreachable_matches() {
        let probe = UdpProbe::new(40);
        let packet = icmp_error(
            ICMP_DEST_UNREACHABLE,
            ICMP_PORT_UNREACHABLE,
            IPPROTO_UDP,
            33500,
        );
        assert!(probe.is_valid_response(&packet, 33500).unwrap());
    }

    #[test]
    fn test_rejects_non_udp_quote() {
        let probe = UdpProbe::new(40);
        let packet = icmp_error(ICMP_TIME_EXCEEDED, 0, IPPROTO_TCP, 33440);
        assert!(!probe.is_valid_response(&packet, 33440).unwrap());
    }

    #[test]
    fn test_rejects_inner_header_with_options() {
        let probe = UdpProbe::new(40);
        let mut packet = icmp_error(ICMP_TIME_EXCEEDED, 0, IPPROTO_UDP, 33440);
        // IHL 6: the 4 bytes after the base header are options, so the
        // quoted UDP header now starts 4 bytes later.
        packet[8] = 0x46;
        packet.splice(28..28, [1u8, 1, 1, 0]);
        assert!(probe.is_valid_response(&packet, 33440).unwrap());
    }

    #[test]
    fn test_truncated_packets_are_not_replies() {
        let probe = UdpProbe::new(40);
        let packet = icmp_error(ICMP_TIME_EXCEEDED, 0, IPPROTO_UDP, 33440);
        for len in 0..packet.len() - 4 {
            assert!(
                !probe.is_valid_response(&packet[..len], 33440).unwrap(),
                "length {} accepted",
                len
            );
        }
        // The destination port sits in the first 4 bytes; a quote cut right
        // after it is still incomplete.
        assert!(!probe
            .is_valid_response(&packet[..packet.len() - 4], 33440)
            .unwrap());
    }
}
