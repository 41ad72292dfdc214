//! TCP packet construction using pnet.

use hoptrace_common::TracerouteError;
use hoptrace_packets::checksum;
use hoptrace_packets::ipv4_pseudo_header;
use hoptrace_packets::parser::{IPPROTO_TCP, PSEUDO_HEADER_LEN, TCP_HEADER_LEN};
use pnet_packet::tcp::{MutableTcpPacket, TcpFlags};
use std::net::Ipv4Addr;

/// TCP window size used in SYN packets.
pub const TCP_WINDOW_SIZE: u16 = 64240;

/// Creates a bare TCP SYN header (no options, no payload) for a raw socket.
///
/// The kernel prepends the IP header; the checksum covers the IPv4
/// pseudo-header for `src_ip`/`dst_ip` followed by the TCP header.
pub fn create_tcp_syn_packet(
    src_ip: Ipv4Addr,
    dst_ip: Ipv4Addr,
    src_port: u16,
    dst_port: u16,
    seq_num: u32,
) -> Result<Vec<u8>, TracerouteError> {
    let mut buffer = vec![0u8; TCP_HEADER_LEN];

    {
        let mut tcp_packet = MutableTcpPacket::new(&mut buffer)
            .ok_or_else(|| TracerouteError::Internal("Failed to create TCP packet".to_string()))?;

        tcp_packet.set_source(src_port);
        tcp_packet.set_destination(dst_port);
        tcp_packet.set_sequence(seq_num);
        tcp_packet.set_acknowledgement(0);
        tcp_packet.set_data_offset(5); // 5 * 4 = 20 bytes (no options)
        tcp_packet.set_flags(TcpFlags::SYN);
        tcp_packet.set_window(TCP_WINDOW_SIZE);
        tcp_packet.set_urgent_ptr(0);
        tcp_packet.set_checksum(0);
    }

    let mut sum_input = Vec::with_capacity(PSEUDO_HEADER_LEN + TCP_HEADER_LEN);
    sum_input.extend_from_slice(&ipv4_pseudo_header(
        src_ip,
        dst_ip,
        IPPROTO_TCP,
        TCP_HEADER_LEN as u16,
    ));
    sum_input.extend_from_slice(&buffer);
    let tcp_checksum = checksum(&sum_input);
    buffer[16..18].copy_from_slice(&tcp_checksum.to_be_bytes());

    Ok(buffer)
}
