#![cfg(any(target_os = "linux", target_os = "macos"))]

use hoptrace_common::{ProbeProtocol, Protocol, TraceParameters};
use hoptrace_icmp::IcmpProbe;
use hoptrace_packets::{new_source_sink, parse_ipv4_header};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

fn run_icmp_probe(target: Ipv4Addr) -> Result<(), String> {
    let params = TraceParameters {
        protocol: Protocol::Icmp,
        destination: target,
        ..Default::default()
    };
    let mut handle = new_source_sink(&params).map_err(|e| e.to_string())?;
    let probe = IcmpProbe::for_current_process();
    let packet = probe
        .build_probe(33434, &mut StdRng::seed_from_u64(1))
        .map_err(|e| e.to_string())?;

    handle.sink.set_ttl(64).map_err(|e| e.to_string())?;
    handle
        .sink
        .send_to(&packet.bytes, SocketAddrV4::new(target, 0))
        .map_err(|e| format!("send probe failed: {}", e))?;

    let deadline = Instant::now() + Duration::from_secs(3);
    let mut buf = vec![0u8; 1500];
    while Instant::now() < deadline {
        if !handle
            .source
            .wait_readable(Duration::from_millis(200))
            .map_err(|e| e.to_string())?
        {
            continue;
        }
        let n = match handle.source.read(&mut buf) {
            Ok(n) => n,
            Err(_) => continue,
        };
        let Ok(ip) = parse_ipv4_header(&buf[..n]) else {
            continue;
        };
        if probe
            .is_valid_response(ip.payload(&buf[..n]), 33434)
            .unwrap_or(false)
        {
            return Ok(());
        }
    }
    Err("no ICMP response received".to_string())
}

#[test]
#[ignore]
fn icmp_probe_ipv4() {
    let target = std::env::var("HOPTRACE_TARGET")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(Ipv4Addr::new(8, 8, 8, 8));
    run_icmp_probe(target).expect("icmp probe v4");
}
