//! Classic traceroute text output.

use crate::hop::{HopOutcome, ProbeOutcome, ReplyKind};
use hoptrace_packets::parser::{
    ICMP_FRAGMENTATION_NEEDED, ICMP_HOST_UNREACHABLE, ICMP_NET_UNREACHABLE,
    ICMP_PORT_UNREACHABLE, ICMP_PROTOCOL_UNREACHABLE, ICMP_SOURCE_ROUTE_FAILED,
};
use std::fmt::Write;
use std::net::{IpAddr, Ipv4Addr};
use tracing::trace;

/// Maps responder addresses to the names printed next to them.
pub trait NameResolver {
    fn name(&self, addr: Ipv4Addr) -> String;
}

/// Reverse DNS through the system resolver, falling back to the address.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsResolver;

impl NameResolver for DnsResolver {
    fn name(&self, addr: Ipv4Addr) -> String {
        match dns_lookup::lookup_addr(&IpAddr::V4(addr)) {
            Ok(name) => name,
            Err(e) => {
                trace!(%addr, error = %e, "Reverse lookup failed");
                addr.to_string()
            }
        }
    }
}

/// Prints addresses only (`-n`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericResolver;

impl NameResolver for NumericResolver {
    fn name(&self, addr: Ipv4Addr) -> String {
        addr.to_string()
    }
}

/// `traceroute to <host> (<ip>), <max_ttl> hops max, <len> byte packets`
pub fn format_header(host: &str, destination: Ipv4Addr, max_ttl: u8, packet_len: usize) -> String {
    format!(
        "traceroute to {} ({}), {} hops max, {} byte packets",
        host, destination, max_ttl, packet_len
    )
}

/// Annotation for unreachable codes other than port unreachable.
fn unreachable_flag(code: u8) -> Option<&'static str> {
    match code {
        ICMP_PORT_UNREACHABLE => None,
        ICMP_NET_UNREACHABLE => Some("!N"),
        ICMP_HOST_UNREACHABLE => Some("!H"),
        ICMP_PROTOCOL_UNREACHABLE => Some("!P"),
        ICMP_FRAGMENTATION_NEEDED => Some("!F"),
        ICMP_SOURCE_ROUTE_FAILED => Some("!S"),
        _ => Some("!X"),
    }
}

/// Formats one TTL line.
///
/// Probes are replayed through a fresh [`HopOutcome`]; a responder's name is
/// printed only when it differs from that aggregate's `last_responder`.
pub fn format_hop(hop: &HopOutcome, resolver: &dyn NameResolver, summary: bool) -> String {
    let mut line = format!("{:2} ", hop.ttl);
    let mut shown = HopOutcome::new(hop.ttl);

    for probe in &hop.probes {
        line.push(' ');
        match probe {
            ProbeOutcome::Reply(reply) => {
                if shown.last_responder != Some(reply.responder) {
                    let _ = write!(
                        line,
                        "{} ({})  ",
                        resolver.name(reply.responder),
                        reply.responder
                    );
                }
                let _ = write!(line, "{:.3} ms", reply.rtt.as_secs_f64() * 1000.0);
                if let ReplyKind::Unreachable(code) = reply.kind {
                    if let Some(flag) = unreachable_flag(code) {
                        let _ = write!(line, " {}", flag);
                    }
                }
            }
            ProbeOutcome::Timeout | ProbeOutcome::SendFailed => line.push('*'),
        }
        shown.record(*probe);
    }

    if summary {
        let _ = write!(line, " ({}% loss)", hop.loss_percent());
    }
    line
}
