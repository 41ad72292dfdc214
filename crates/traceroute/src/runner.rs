//! Serial trace execution.
//!
//! One probe is in flight at a time: each probe is sent, then the receive
//! socket is drained until a matching reply arrives or the probe's wait time,
//! measured from its send instant, runs out.

use crate::hop::{HopOutcome, ProbeOutcome, ProbeReply, ReplyKind, TraceOutcome};
use crate::protocol::ProbeKind;
use hoptrace_common::{ProbePacket, ProbeProtocol, TraceParameters, TracerouteError};
use hoptrace_packets::parser::IPPROTO_ICMP;
use hoptrace_packets::{parse_icmp_header, parse_ipv4_header, PacketSink, PacketSource};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::net::SocketAddrV4;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};

/// Receive buffer size; large enough for any ICMP error we care about.
const RECV_BUFFER_LEN: usize = 1500;

/// Drives a trace from `first_ttl` up to `max_ttl` or the destination.
pub struct Tracer {
    params: TraceParameters,
    probe: ProbeKind,
    sink: Box<dyn PacketSink + Send>,
    source: Box<dyn PacketSource + Send>,
    rng: StdRng,
    buffer: Vec<u8>,
    reported_unsupported: bool,
}

impl Tracer {
    /// Validates `params` and takes ownership of the sockets.
    pub fn new(
        params: TraceParameters,
        sink: Box<dyn PacketSink + Send>,
        source: Box<dyn PacketSource + Send>,
    ) -> Result<Self, TracerouteError> {
        params.validate()?;
        let probe = ProbeKind::from_params(&params);
        Ok(Self {
            params,
            probe,
            sink,
            source,
            rng: StdRng::seed_from_u64(default_seed()),
            buffer: vec![0u8; RECV_BUFFER_LEN],
            reported_unsupported: false,
        })
    }

    /// Replaces the random source used for TCP source ports and sequence numbers.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Replaces the probe implementation chosen from the parameters.
    pub fn with_probe(mut self, probe: ProbeKind) -> Self {
        self.probe = probe;
        self
    }

    pub fn params(&self) -> &TraceParameters {
        &self.params
    }

    /// Size of each probe as written to the send socket.
    pub fn probe_len(&self) -> usize {
        self.probe.probe_len()
    }

    /// Runs the trace, handing each hop to `on_hop` as soon as its probes
    /// are done.
    ///
    /// Stops after the first hop that reaches the destination. Lost probes
    /// are recorded, never fatal; only socket-level failures abort the run.
    pub fn run<F>(&mut self, mut on_hop: F) -> Result<TraceOutcome, TracerouteError>
    where
        F: FnMut(&HopOutcome),
    {
        let mut outcome = TraceOutcome::default();

        for ttl in self.params.first_ttl..=self.params.max_ttl {
            self.sink.set_ttl(ttl).map_err(|e| {
                warn!(ttl, error = %e, "Failed to set TTL");
                TracerouteError::from(e)
            })?;

            let mut hop = HopOutcome::new(ttl);
            for probe_index in 0..self.params.nprobes {
                let port = self.params.probe_port(ttl, probe_index);
                let result = self.probe_once(ttl, port)?;
                hop.record(result);
            }

            debug!(
                ttl,
                lost = hop.lost(),
                dest_reached = hop.dest_reached,
                "TTL complete"
            );
            on_hop(&hop);

            let reached = hop.dest_reached;
            outcome.hops.push(hop);
            if reached {
                debug!("Reached destination, stopping");
                outcome.destination_reached = true;
                break;
            }
        }

        Ok(outcome)
    }

    fn probe_once(&mut self, ttl: u8, port: u16) -> Result<ProbeOutcome, TracerouteError> {
        let packet = match self.probe.build_probe(port, &mut self.rng) {
            Ok(packet) => packet,
            Err(e) if e.is_not_implemented() => {
                self.report_unsupported(&e);
                return Ok(ProbeOutcome::SendFailed);
            }
            Err(e) => {
                warn!(ttl, port, error = %e, "Failed to build probe");
                return Ok(ProbeOutcome::SendFailed);
            }
        };

        let sent_at = match self.send_probe(&packet) {
            Ok(sent_at) => {
                trace!(ttl, port, bytes = packet.bytes.len(), "Sent probe");
                sent_at
            }
            Err(e) => {
                warn!(ttl, port, error = %e, "Failed to send probe");
                return Ok(ProbeOutcome::SendFailed);
            }
        };

        match self.await_reply(port, sent_at)? {
            Some(reply) => {
                debug!(
                    ttl,
                    port,
                    responder = %reply.responder,
                    rtt_ms = reply.rtt.as_secs_f64() * 1000.0,
                    "Received probe response"
                );
                Ok(ProbeOutcome::Reply(reply))
            }
            None => {
                debug!(ttl, port, "Timeout waiting for response");
                Ok(ProbeOutcome::Timeout)
            }
        }
    }

    /// Writes `packet` to the destination and returns the send instant.
    ///
    /// A short write counts as a failed send.
    fn send_probe(&mut self, packet: &ProbePacket) -> Result<Instant, TracerouteError> {
        let addr = SocketAddrV4::new(self.params.destination, packet.port);
        let sent_at = Instant::now();
        let n = self
            .sink
            .send_to(&packet.bytes, addr)
            .map_err(TracerouteError::WriteFailed)?;
        if n != packet.bytes.len() {
            return Err(TracerouteError::WriteFailed(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} bytes", n, packet.bytes.len()),
            )));
        }
        Ok(sent_at)
    }

    /// Reads ICMP traffic until a reply to the probe keyed by `port` shows up
    /// or `wait` has elapsed since `sent_at`.
    ///
    /// Unrelated packets do not extend the deadline.
    fn await_reply(
        &mut self,
        port: u16,
        sent_at: Instant,
    ) -> Result<Option<ProbeReply>, TracerouteError> {
        let wait = self.params.wait;

        loop {
            let elapsed = sent_at.elapsed();
            if elapsed >= wait {
                return Ok(None);
            }

            match self.source.wait_readable(wait - elapsed) {
                Ok(true) => {}
                Ok(false) => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TracerouteError::from(e)),
            }

            let n = match self.source.read(&mut self.buffer) {
                Ok(0) => continue,
                Ok(n) => n,
                Err(e) => {
                    trace!(error = %e, "Read failed, continuing");
                    continue;
                }
            };
            let received_at = Instant::now();
            let packet = &self.buffer[..n];

            let ip = match parse_ipv4_header(packet) {
                Ok(ip) => ip,
                Err(e) => {
                    trace!(error = %e, "Discarding malformed packet");
                    continue;
                }
            };
            if ip.protocol != IPPROTO_ICMP {
                trace!(protocol = ip.protocol, "Discarding non-ICMP packet");
                continue;
            }
            let icmp = ip.payload(packet);
            let header = match parse_icmp_header(icmp) {
                Ok(header) => header,
                Err(e) => {
                    trace!(error = %e, "Discarding short ICMP message");
                    continue;
                }
            };

            match self.probe.is_valid_response(icmp, port) {
                Ok(true) => {
                    return Ok(Some(ProbeReply {
                        responder: ip.src,
                        rtt: received_at.duration_since(sent_at),
                        kind: ReplyKind::from_icmp(header.icmp_type, header.icmp_code),
                    }));
                }
                Ok(false) => {
                    debug!(
                        from = %ip.src,
                        icmp_type = header.icmp_type,
                        icmp_code = header.icmp_code,
                        "Discarding unrelated ICMP message"
                    );
                }
                Err(e) if e.is_not_implemented() => self.report_unsupported(&e),
                Err(e) if e.is_retryable() => {
                    trace!(error = %e, "Retryable error, continuing");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn report_unsupported(&mut self, err: &TracerouteError) {
        if !self.reported_unsupported {
            warn!(error = %err, "Protocol support incomplete; probes will show as lost");
            self.reported_unsupported = true;
        }
    }
}

/// Seed mixing wall-clock time with the process id.
fn default_seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    nanos ^ u64::from(std::process::id())
}
