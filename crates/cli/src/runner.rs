//! Resolution, socket setup and output for one trace.

use crate::Args;
use hoptrace_common::{TraceParameters, TracerouteError, DEFAULT_BASE_PORT};
use hoptrace_traceroute::{
    format_header, format_hop, DnsResolver, NameResolver, NumericResolver, TraceReport, Tracer,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::{debug, info};

/// A resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub ip: Ipv4Addr,
    /// Distinct IPv4 addresses the name resolved to.
    pub candidates: usize,
}

/// Resolves `host` to its first IPv4 address.
pub fn resolve_target(host: &str) -> Result<Target, TracerouteError> {
    if let Ok(ip) = host.parse::<Ipv4Addr>() {
        return Ok(Target { ip, candidates: 1 });
    }

    let addrs: Vec<IpAddr> = (host, 0)
        .to_socket_addrs()
        .map_err(|e| TracerouteError::DnsResolutionFailed {
            hostname: host.to_string(),
            reason: e.to_string(),
        })?
        .map(|addr| addr.ip())
        .collect();

    let mut v4: Vec<Ipv4Addr> = Vec::new();
    for addr in &addrs {
        if let IpAddr::V4(ip) = addr {
            if !v4.contains(ip) {
                v4.push(*ip);
            }
        }
    }

    match (v4.first(), addrs.first()) {
        (Some(&ip), _) => Ok(Target {
            ip,
            candidates: v4.len(),
        }),
        (None, Some(&other)) => Err(TracerouteError::NoIpv4Address(other)),
        (None, None) => Err(TracerouteError::DnsResolutionFailed {
            hostname: host.to_string(),
            reason: "no addresses".to_string(),
        }),
    }
}

/// Local address the kernel would use to reach `target`.
pub fn local_addr_for_target(target: Ipv4Addr) -> Result<Ipv4Addr, TracerouteError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(TracerouteError::SocketCreation)?;
    socket
        .connect(SocketAddr::from((target, DEFAULT_BASE_PORT)))
        .map_err(|e| TracerouteError::SocketBind {
            target: target.to_string(),
            source: e,
        })?;

    match socket.local_addr().map_err(TracerouteError::SocketCreation)?.ip() {
        IpAddr::V4(ip) => Ok(ip),
        IpAddr::V6(ip) => Err(TracerouteError::Internal(format!(
            "unexpected IPv6 source address {}",
            ip
        ))),
    }
}

/// Name of the interface carrying `source`, if any.
pub fn interface_for_source(source: Ipv4Addr) -> Option<String> {
    let interfaces = match if_addrs::get_if_addrs() {
        Ok(interfaces) => interfaces,
        Err(e) => {
            debug!(error = %e, "Failed to list interfaces");
            return None;
        }
    };
    interfaces
        .into_iter()
        .find(|iface| iface.ip() == IpAddr::V4(source))
        .map(|iface| iface.name)
}

pub fn run(args: &Args) -> Result<(), TracerouteError> {
    let target = resolve_target(&args.host)?;
    if target.candidates > 1 {
        eprintln!(
            "Warning: {} has multiple addresses; using {}",
            args.host, target.ip
        );
    }

    let source = match args.source {
        Some(source) => source,
        None => local_addr_for_target(target.ip)?,
    };
    let params = args.to_params(target.ip, source)?;

    if params.verbose && !args.json {
        let interface = params
            .interface
            .clone()
            .or_else(|| interface_for_source(source))
            .unwrap_or_else(|| "unknown".to_string());
        println!("Using source address: {}", source);
        println!("Using interface: {}", interface);
    }

    info!(
        target = %params.destination,
        protocol = %params.protocol,
        port = params.base_port,
        "Starting traceroute"
    );

    let (mut tracer, header) = open_tracer(&args.host, params)?;
    let resolver: Box<dyn NameResolver> = if args.numeric {
        Box::new(NumericResolver)
    } else {
        Box::new(DnsResolver)
    };

    if !args.json {
        println!("{}", header);
    }
    let summary = tracer.params().summary;
    let outcome = tracer.run(|hop| {
        if !args.json {
            println!("{}", format_hop(hop, resolver.as_ref(), summary));
        }
    })?;

    if args.json {
        let names = if args.numeric {
            None
        } else {
            Some(resolver.as_ref())
        };
        let report = TraceReport::new(&args.host, tracer.params(), &outcome, names);
        let json = report
            .to_json_pretty()
            .map_err(|e| TracerouteError::Internal(format!("Failed to serialize results: {}", e)))?;
        println!("{}", json);
    }
    Ok(())
}

#[cfg(unix)]
fn open_tracer(host: &str, params: TraceParameters) -> Result<(Tracer, String), TracerouteError> {
    let handle = hoptrace_packets::new_source_sink(&params)?;
    let tracer = Tracer::new(params, handle.sink, handle.source)?;
    let header = format_header(
        host,
        tracer.params().destination,
        tracer.params().max_ttl,
        tracer.probe_len(),
    );
    Ok((tracer, header))
}

#[cfg(not(unix))]
fn open_tracer(_host: &str, _params: TraceParameters) -> Result<(Tracer, String), TracerouteError> {
    Err(TracerouteError::Internal(
        "raw sockets are only supported on unix".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_literal() {
        let target = resolve_target("192.0.2.7").unwrap();
        assert_eq!(target.ip, Ipv4Addr::new(192, 0, 2, 7));
        assert_eq!(target.candidates, 1);
    }

    #[test]
    fn test_resolve_ipv6_literal_has_no_ipv4() {
        assert!(matches!(
            resolve_target("::1"),
            Err(TracerouteError::NoIpv4Address(_))
        ));
    }

    #[test]
    fn test_loopback_source() {
        let source = local_addr_for_target(Ipv4Addr::LOCALHOST).unwrap();
        assert!(source.is_loopback());
    }
}
