//! Length-checked decoding of the headers found in ICMP replies.
//!
//! Every decoder validates the minimum length before reading a field, so a
//! truncated or hostile packet yields an error rather than a panic.

use crate::checksum::write_checksum;
use hoptrace_common::TracerouteError;
use std::net::Ipv4Addr;

pub const IPV4_HEADER_MIN_LEN: usize = 20;
pub const ICMP_HEADER_LEN: usize = 8;
pub const UDP_HEADER_LEN: usize = 8;
pub const TCP_HEADER_LEN: usize = 20;
pub const PSEUDO_HEADER_LEN: usize = 12;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;
pub const IPPROTO_GRE: u8 = 47;

pub const ICMP_ECHO_REPLY: u8 = 0;
pub const ICMP_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_ECHO_REQUEST: u8 = 8;
pub const ICMP_TIME_EXCEEDED: u8 = 11;

pub const ICMP_NET_UNREACHABLE: u8 = 0;
pub const ICMP_HOST_UNREACHABLE: u8 = 1;
pub const ICMP_PROTOCOL_UNREACHABLE: u8 = 2;
pub const ICMP_PORT_UNREACHABLE: u8 = 3;
pub const ICMP_FRAGMENTATION_NEEDED: u8 = 4;
pub const ICMP_SOURCE_ROUTE_FAILED: u8 = 5;

/// Decoded IPv4 header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Header {
    /// Header length in bytes (IHL * 4).
    pub header_len: usize,
    /// Total length as claimed by the header.
    pub total_len: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    /// Builds an option-less header for `payload_len` bytes of `protocol`.
    pub fn new(src: Ipv4Addr, dst: Ipv4Addr, protocol: u8, ttl: u8, payload_len: usize) -> Self {
        Self {
            header_len: IPV4_HEADER_MIN_LEN,
            total_len: (IPV4_HEADER_MIN_LEN + payload_len) as u16,
            ttl,
            protocol,
            src,
            dst,
        }
    }

    /// Encodes the header (without options) including its checksum.
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_MIN_LEN] {
        let mut buf = [0u8; IPV4_HEADER_MIN_LEN];
        buf[0] = 0x45;
        buf[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        buf[12..16].copy_from_slice(&self.src.octets());
        buf[16..20].copy_from_slice(&self.dst.octets());
        write_checksum(&mut buf, 10);
        buf
    }

    /// Returns the bytes following this header in `packet`.
    ///
    /// The slice is clipped to what was actually received; ICMP errors quote
    /// only the start of the original datagram.
    pub fn payload<'a>(&self, packet: &'a [u8]) -> &'a [u8] {
        packet.get(self.header_len..).unwrap_or(&[])
    }
}

/// Parses an IPv4 header at the start of `buf`.
pub fn parse_ipv4_header(buf: &[u8]) -> Result<Ipv4Header, TracerouteError> {
    if buf.len() < IPV4_HEADER_MIN_LEN {
        return Err(TracerouteError::PacketTooShort {
            expected: IPV4_HEADER_MIN_LEN,
            actual: buf.len(),
        });
    }

    let version = buf[0] >> 4;
    if version != 4 {
        return Err(TracerouteError::PacketParseFailed {
            layer: "IPv4",
            reason: format!("unexpected IP version {}", version),
        });
    }

    let header_len = usize::from(buf[0] & 0x0f) * 4;
    if header_len < IPV4_HEADER_MIN_LEN {
        return Err(TracerouteError::PacketParseFailed {
            layer: "IPv4",
            reason: format!("header length {} below minimum", header_len),
        });
    }
    if buf.len() < header_len {
        return Err(TracerouteError::PacketTooShort {
            expected: header_len,
            actual: buf.len(),
        });
    }

    Ok(Ipv4Header {
        header_len,
        total_len: u16::from_be_bytes([buf[2], buf[3]]),
        ttl: buf[8],
        protocol: buf[9],
        src: Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]),
        dst: Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]),
    })
}

/// Decoded ICMPv4 header. `identifier` and `sequence` are the two halves of
/// the rest-of-header word; they only carry meaning for echo messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub icmp_type: u8,
    pub icmp_code: u8,
    pub checksum: u16,
    pub identifier: u16,
    pub sequence: u16,
}

/// Parses the fixed 8-byte ICMPv4 header.
pub fn parse_icmp_header(buf: &[u8]) -> Result<IcmpHeader, TracerouteError> {
    if buf.len() < ICMP_HEADER_LEN {
        return Err(TracerouteError::PacketTooShort {
            expected: ICMP_HEADER_LEN,
            actual: buf.len(),
        });
    }

    Ok(IcmpHeader {
        icmp_type: buf[0],
        icmp_code: buf[1],
        checksum: u16::from_be_bytes([buf[2], buf[3]]),
        identifier: u16::from_be_bytes([buf[4], buf[5]]),
        sequence: u16::from_be_bytes([buf[6], buf[7]]),
    })
}

/// Unwraps the datagram quoted by an ICMP error message.
///
/// Returns the quoted IP header and the transport bytes that follow it.
pub fn parse_icmp_quote(icmp: &[u8]) -> Result<(Ipv4Header, &[u8]), TracerouteError> {
    if icmp.len() < ICMP_HEADER_LEN {
        return Err(TracerouteError::PacketTooShort {
            expected: ICMP_HEADER_LEN,
            actual: icmp.len(),
        });
    }
    let quoted = &icmp[ICMP_HEADER_LEN..];
    let inner_ip = parse_ipv4_header(quoted)?;
    Ok((inner_ip, inner_ip.payload(quoted)))
}

/// UDP header info parsed from ICMP payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpInfo {
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// UDP length.
    pub length: u16,
    /// UDP checksum.
    pub checksum: u16,
}

/// Parse the first 8 bytes of a UDP header from an ICMP payload.
pub fn parse_udp_first_bytes(buf: &[u8]) -> Result<UdpInfo, TracerouteError> {
    if buf.len() < UDP_HEADER_LEN {
        return Err(TracerouteError::PacketTooShort {
            expected: UDP_HEADER_LEN,
            actual: buf.len(),
        });
    }

    Ok(UdpInfo {
        src_port: u16::from_be_bytes([buf[0], buf[1]]),
        dst_port: u16::from_be_bytes([buf[2], buf[3]]),
        length: u16::from_be_bytes([buf[4], buf[5]]),
        checksum: u16::from_be_bytes([buf[6], buf[7]]),
    })
}

/// Builds the IPv4 pseudo-header used by the TCP and UDP checksums.
pub fn ipv4_pseudo_header(
    src: Ipv4Addr,
    dst: Ipv4Addr,
    protocol: u8,
    length: u16,
) -> [u8; PSEUDO_HEADER_LEN] {
    let mut buf = [0u8; PSEUDO_HEADER_LEN];
    buf[0..4].copy_from_slice(&src.octets());
    buf[4..8].copy_from_slice(&dst.octets());
    buf[9] = protocol;
    buf[10..12].copy_from_slice(&length.to_be_bytes());
    buf
}
