//! Per-probe and per-hop trace results.

use hoptrace_packets::parser::{
    ICMP_DEST_UNREACHABLE, ICMP_ECHO_REPLY, ICMP_PORT_UNREACHABLE, ICMP_TIME_EXCEEDED,
};
use std::net::Ipv4Addr;
use std::time::Duration;

/// What an accepted reply says about the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A router on the way dropped the probe.
    TimeExceeded,
    /// The destination answered an ICMP probe.
    EchoReply,
    /// Destination Unreachable with the given code.
    Unreachable(u8),
    Other { icmp_type: u8, icmp_code: u8 },
}

impl ReplyKind {
    pub fn from_icmp(icmp_type: u8, icmp_code: u8) -> Self {
        match icmp_type {
            ICMP_TIME_EXCEEDED => Self::TimeExceeded,
            ICMP_ECHO_REPLY => Self::EchoReply,
            ICMP_DEST_UNREACHABLE => Self::Unreachable(icmp_code),
            _ => Self::Other {
                icmp_type,
                icmp_code,
            },
        }
    }

    /// Echo replies and port unreachables come from the destination itself.
    pub fn reaches_destination(&self) -> bool {
        matches!(self, Self::EchoReply | Self::Unreachable(ICMP_PORT_UNREACHABLE))
    }

    /// Wire type and code.
    pub fn icmp_type_code(&self) -> (u8, u8) {
        match *self {
            Self::TimeExceeded => (ICMP_TIME_EXCEEDED, 0),
            Self::EchoReply => (ICMP_ECHO_REPLY, 0),
            Self::Unreachable(code) => (ICMP_DEST_UNREACHABLE, code),
            Self::Other {
                icmp_type,
                icmp_code,
            } => (icmp_type, icmp_code),
        }
    }
}

/// A reply matched to a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReply {
    /// Source address of the ICMP message.
    pub responder: Ipv4Addr,
    pub rtt: Duration,
    pub kind: ReplyKind,
}

/// Result of one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reply(ProbeReply),
    /// Nothing matched within the wait time.
    Timeout,
    /// The probe never left the host.
    SendFailed,
}

impl ProbeOutcome {
    pub fn reply(&self) -> Option<&ProbeReply> {
        match self {
            Self::Reply(reply) => Some(reply),
            _ => None,
        }
    }

    pub fn is_lost(&self) -> bool {
        self.reply().is_none()
    }
}

/// All probes sent at one TTL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopOutcome {
    pub ttl: u8,
    pub probes: Vec<ProbeOutcome>,
    /// Most recent distinct responder seen at this TTL.
    pub last_responder: Option<Ipv4Addr>,
    pub dest_reached: bool,
}

impl HopOutcome {
    pub fn new(ttl: u8) -> Self {
        Self {
            ttl,
            probes: Vec::new(),
            last_responder: None,
            dest_reached: false,
        }
    }

    /// Appends a probe result, updating the responder and destination state.
    pub fn record(&mut self, outcome: ProbeOutcome) {
        if let ProbeOutcome::Reply(reply) = &outcome {
            self.last_responder = Some(reply.responder);
            if reply.kind.reaches_destination() {
                self.dest_reached = true;
            }
        }
        self.probes.push(outcome);
    }

    /// Number of probes without a reply.
    pub fn lost(&self) -> usize {
        self.probes.iter().filter(|p| p.is_lost()).count()
    }

    /// Integer loss percentage, 0 for a hop with no probes.
    pub fn loss_percent(&self) -> u32 {
        if self.probes.is_empty() {
            return 0;
        }
        (self.lost() * 100 / self.probes.len()) as u32
    }
}

/// A finished trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOutcome {
    pub hops: Vec<HopOutcome>,
    pub destination_reached: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(last: u8, kind: ReplyKind) -> ProbeOutcome {
        ProbeOutcome::Reply(ProbeReply {
            responder: Ipv4Addr::new(10, 0, 0, last),
            rtt: Duration::from_millis(5),
            kind,
        })
    }

    #[test]
    fn test_reply_kind_from_icmp() {
        assert_eq!(ReplyKind::from_icmp(11, 0), ReplyKind::TimeExceeded);
        assert_eq!(ReplyKind::from_icmp(0, 0), ReplyKind::EchoReply);
        assert_eq!(ReplyKind::from_icmp(3, 1), ReplyKind::Unreachable(1));
        assert_eq!(
            ReplyKind::from_icmp(5, 1),
            ReplyKind::Other {
                icmp_type: 5,
                icmp_code: 1
            }
        );
        assert_eq!(ReplyKind::Unreachable(13).icmp_type_code(), (3, 13));
    }

    #[test]
    fn test_destination_kinds() {
        assert!(ReplyKind::EchoReply.reaches_destination());
        assert!(ReplyKind::Unreachable(ICMP_PORT_UNREACHABLE).reaches_destination());
        assert!(!ReplyKind::Unreachable(1).reaches_destination());
        assert!(!ReplyKind::TimeExceeded.reaches_destination());
    }

    #[test]
    fn test_hop_tracks_last_responder() {
        let mut hop = HopOutcome::new(4);
        hop.record(reply(1, ReplyKind::TimeExceeded));
        hop.record(ProbeOutcome::Timeout);
        assert_eq!(hop.last_responder, Some(Ipv4Addr::new(10, 0, 0, 1)));
        hop.record(reply(2, ReplyKind::TimeExceeded));
        assert_eq!(hop.last_responder, Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(!hop.dest_reached);
    }

    #[test]
    fn test_hop_loss() {
        let mut hop = HopOutcome::new(1);
        assert_eq!(hop.loss_percent(), 0);

        hop.record(reply(1, ReplyKind::Unreachable(ICMP_PORT_UNREACHABLE)));
        hop.record(ProbeOutcome::Timeout);
        hop.record(ProbeOutcome::SendFailed);
        assert_eq!(hop.lost(), 2);
        assert_eq!(hop.loss_percent(), 66);
        assert!(hop.dest_reached);
    }
}
