//! JSON result document.

use crate::display::NameResolver;
use crate::hop::{HopOutcome, ProbeOutcome, TraceOutcome};
use hoptrace_common::{Protocol, TraceParameters};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceReport {
    pub protocol: Protocol,
    pub source: ReportSource,
    pub destination: ReportDestination,
    pub destination_reached: bool,
    pub hops: Vec<ReportHop>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSource {
    pub ip_address: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDestination {
    pub hostname: String,
    pub ip_address: Ipv4Addr,
    /// Base port of the probe sequence.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportHop {
    pub ttl: u8,
    pub dest_reached: bool,
    /// Lost probes, in percent.
    pub loss: u32,
    /// One entry per probe; `null` for a lost probe.
    pub probes: Vec<Option<ReportProbe>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProbe {
    pub ip_address: Ipv4Addr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_dns: Option<String>,
    /// Round-trip time in milliseconds.
    pub rtt: f64,
    pub icmp_type: u8,
    pub icmp_code: u8,
}

impl TraceReport {
    /// Builds the document for a finished trace.
    ///
    /// With a resolver, each responder gets a `reverse_dns` entry unless its
    /// name is just the address again.
    pub fn new(
        host: &str,
        params: &TraceParameters,
        outcome: &TraceOutcome,
        resolver: Option<&dyn NameResolver>,
    ) -> Self {
        Self {
            protocol: params.protocol,
            source: ReportSource {
                ip_address: params.source,
                interface: params.interface.clone(),
            },
            destination: ReportDestination {
                hostname: host.to_string(),
                ip_address: params.destination,
                port: params.base_port,
            },
            destination_reached: outcome.destination_reached,
            hops: outcome
                .hops
                .iter()
                .map(|hop| ReportHop::new(hop, resolver))
                .collect(),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl ReportHop {
    fn new(hop: &HopOutcome, resolver: Option<&dyn NameResolver>) -> Self {
        let probes = hop
            .probes
            .iter()
            .map(|probe| match probe {
                ProbeOutcome::Reply(reply) => {
                    let (icmp_type, icmp_code) = reply.kind.icmp_type_code();
                    let reverse_dns = resolver
                        .map(|r| r.name(reply.responder))
                        .filter(|name| *name != reply.responder.to_string());
                    Some(ReportProbe {
                        ip_address: reply.responder,
                        reverse_dns,
                        rtt: reply.rtt.as_secs_f64() * 1000.0,
                        icmp_type,
                        icmp_code,
                    })
                }
                ProbeOutcome::Timeout | ProbeOutcome::SendFailed => None,
            })
            .collect();

        Self {
            ttl: hop.ttl,
            dest_reached: hop.dest_reached,
            loss: hop.loss_percent(),
            probes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::NumericResolver;
    use crate::hop::{ProbeReply, ReplyKind};
    use std::time::Duration;

    fn outcome() -> TraceOutcome {
        let mut first = HopOutcome::new(1);
        first.record(ProbeOutcome::Timeout);
        first.record(ProbeOutcome::Reply(ProbeReply {
            responder: Ipv4Addr::new(10, 0, 0, 1),
            rtt: Duration::from_millis(2),
            kind: ReplyKind::TimeExceeded,
        }));

        let mut second = HopOutcome::new(2);
        second.record(ProbeOutcome::Reply(ProbeReply {
            responder: Ipv4Addr::new(1, 1, 1, 1),
            rtt: Duration::from_millis(8),
            kind: ReplyKind::Unreachable(3),
        }));

        TraceOutcome {
            hops: vec![first, second],
            destination_reached: true,
        }
    }

    #[test]
    fn test_report_json_shape() {
        let params = TraceParameters {
            destination: Ipv4Addr::new(1, 1, 1, 1),
            source: Ipv4Addr::new(10, 0, 0, 5),
            ..Default::default()
        };
        let report = TraceReport::new("one.one.one.one", &params, &outcome(), None);
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();

        assert_eq!(value["protocol"], "udp");
        assert_eq!(value["destination"]["ip_address"], "1.1.1.1");
        assert_eq!(value["destination"]["port"], 33434);
        assert_eq!(value["destination_reached"], true);
        assert!(value["source"].get("interface").is_none());

        let hops = value["hops"].as_array().unwrap();
        assert_eq!(hops.len(), 2);
        assert_eq!(hops[0]["loss"], 50);
        assert!(hops[0]["probes"][0].is_null());
        assert_eq!(hops[0]["probes"][1]["icmp_type"], 11);
        assert_eq!(hops[1]["probes"][0]["icmp_code"], 3);
        assert_eq!(hops[1]["dest_reached"], true);
        assert!(hops[1]["probes"][0].get("reverse_dns").is_none());
    }

    #[test]
    fn test_numeric_names_are_omitted() {
        let params = TraceParameters::default();
        let report = TraceReport::new("x", &params, &outcome(), Some(&NumericResolver));
        assert!(report.hops[0].probes[1]
            .as_ref()
            .unwrap()
            .reverse_dns
            .is_none());
    }
}
