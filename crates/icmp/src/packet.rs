//! ICMP packet construction using pnet.

use hoptrace_common::TracerouteError;
use hoptrace_packets::parser::ICMP_HEADER_LEN;
use hoptrace_packets::write_checksum;
use pnet_packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet_packet::icmp::{IcmpCode, IcmpTypes};

/// Text carried by every echo request.
pub const ECHO_PAYLOAD: &[u8] = b"ICMP traceroute probe";

/// Echo payload length; `ECHO_PAYLOAD` is zero-padded to it.
pub const ECHO_PAYLOAD_LEN: usize = 32;

/// Creates an ICMP Echo Request (header and payload, no IP header).
///
/// The sequence number carries the probe's port key so that replies can be
/// matched without a table of outstanding probes.
pub fn create_icmp_echo_packet(identifier: u16, sequence: u16) -> Result<Vec<u8>, TracerouteError> {
    let mut buffer = vec![0u8; ICMP_HEADER_LEN + ECHO_PAYLOAD_LEN];

    {
        let mut echo = MutableEchoRequestPacket::new(&mut buffer)
            .ok_or_else(|| TracerouteError::Internal("Failed to create ICMP packet".to_string()))?;

        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode::new(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);

        let mut payload = [0u8; ECHO_PAYLOAD_LEN];
        payload[..ECHO_PAYLOAD.len()].copy_from_slice(ECHO_PAYLOAD);
        echo.set_payload(&payload);
    }

    write_checksum(&mut buffer, 2);
    Ok(buffer)
}
