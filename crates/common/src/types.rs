//! Core types for traceroute operations.

use crate::{
    TracerouteError, DEFAULT_BASE_PORT, DEFAULT_FIRST_TTL, DEFAULT_MAX_TTL, DEFAULT_PACKET_LEN,
    DEFAULT_PROBES, DEFAULT_WAIT_SECS, MAX_PACKET_LEN, MAX_WAIT_SECS,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Protocol used to carry probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Udp,
    Icmp,
    Tcp,
    Gre,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Udp => write!(f, "udp"),
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Gre => write!(f, "gre"),
        }
    }
}

impl std::str::FromStr for Protocol {
    type Err = TracerouteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "udp" => Ok(Protocol::Udp),
            "icmp" => Ok(Protocol::Icmp),
            "tcp" => Ok(Protocol::Tcp),
            "gre" => Ok(Protocol::Gre),
            _ => Err(TracerouteError::UnknownProtocol(s.to_string())),
        }
    }
}

/// Parameters for one trace, fixed once probing starts.
#[derive(Debug, Clone)]
pub struct TraceParameters {
    /// Protocol carrying the probes.
    pub protocol: Protocol,
    /// TTL of the first hop probed.
    pub first_ttl: u8,
    /// Last TTL probed when the destination never answers.
    pub max_ttl: u8,
    /// Probes sent per TTL.
    pub nprobes: u8,
    /// Base of the destination port sequence.
    pub base_port: u16,
    /// How long to wait for each probe's reply, measured from its send time.
    pub wait: Duration,
    /// Probe payload length in bytes.
    pub packet_len: usize,
    /// Log discarded packets and print interface details.
    pub verbose: bool,
    /// Append the per-hop loss percentage to each line.
    pub summary: bool,
    /// Resolved destination.
    pub destination: Ipv4Addr,
    /// Local address probes leave from.
    pub source: Ipv4Addr,
    /// Interface the send socket is bound to.
    pub interface: Option<String>,
}

impl Default for TraceParameters {
    fn default() -> Self {
        Self {
            protocol: Protocol::Udp,
            first_ttl: DEFAULT_FIRST_TTL,
            max_ttl: DEFAULT_MAX_TTL,
            nprobes: DEFAULT_PROBES,
            base_port: DEFAULT_BASE_PORT,
            wait: Duration::from_secs(DEFAULT_WAIT_SECS),
            packet_len: DEFAULT_PACKET_LEN,
            verbose: false,
            summary: false,
            destination: Ipv4Addr::UNSPECIFIED,
            source: Ipv4Addr::UNSPECIFIED,
            interface: None,
        }
    }
}

impl TraceParameters {
    /// Validates the parameters.
    pub fn validate(&self) -> Result<(), TracerouteError> {
        if self.max_ttl == 0 {
            return Err(TracerouteError::InvalidMaxTtl);
        }
        if self.first_ttl == 0 || self.first_ttl > self.max_ttl {
            return Err(TracerouteError::InvalidTtlRange {
                first_ttl: self.first_ttl,
                max_ttl: self.max_ttl,
            });
        }
        if self.nprobes == 0 {
            return Err(TracerouteError::InvalidProbeCount);
        }
        if self.packet_len > MAX_PACKET_LEN {
            return Err(TracerouteError::InvalidPacketLength {
                max: MAX_PACKET_LEN,
                actual: self.packet_len,
            });
        }
        let max_wait = Duration::from_secs(MAX_WAIT_SECS);
        if self.wait > max_wait {
            return Err(TracerouteError::InvalidWaitTime {
                max: max_wait,
                actual: self.wait.as_secs_f64(),
            });
        }
        Ok(())
    }

    /// Correlation key of the probe `probe_index` sent at `ttl`.
    pub fn probe_port(&self, ttl: u8, probe_index: u8) -> u16 {
        probe_port(self.base_port, ttl, self.nprobes, probe_index)
    }
}

/// Maps a probe to `base_port + ttl * nprobes + probe_index`.
///
/// The sum is truncated to 16 bits. The widest span the parameters allow is
/// `255 * 255 + 254`, below 2^16, so distinct probes of one run never share a key.
pub fn probe_port(base_port: u16, ttl: u8, nprobes: u8, probe_index: u8) -> u16 {
    let offset = u32::from(ttl) * u32::from(nprobes) + u32::from(probe_index);
    (u32::from(base_port) + offset) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_trace_parameters_validate() {
        let valid = TraceParameters::default();
        assert!(valid.validate().is_ok());

        let inverted = TraceParameters {
            first_ttl: 30,
            max_ttl: 1,
            ..Default::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(TracerouteError::InvalidTtlRange { .. })
        ));

        let no_probes = TraceParameters {
            nprobes: 0,
            ..Default::default()
        };
        assert!(no_probes.validate().is_err());

        let huge = TraceParameters {
            packet_len: MAX_PACKET_LEN + 1,
            ..Default::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(TracerouteError::InvalidPacketLength { .. })
        ));

        let zero_wait = TraceParameters {
            wait: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_wait.validate().is_ok());
    }

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert_eq!("ICMP".parse::<Protocol>().unwrap(), Protocol::Icmp);
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("gre".parse::<Protocol>().unwrap(), Protocol::Gre);
        assert!("sctp".parse::<Protocol>().is_err());
    }

    #[test]
    fn test_probe_port_layout() {
        assert_eq!(probe_port(33434, 1, 3, 0), 33437);
        assert_eq!(probe_port(33434, 1, 3, 2), 33439);
        assert_eq!(probe_port(33434, 2, 3, 0), 33440);
    }

    #[test]
    fn test_probe_port_unique_at_extremes() {
        let mut seen = HashSet::new();
        for ttl in 1..=255u8 {
            for idx in 0..255u8 {
                assert!(seen.insert(probe_port(65535, ttl, 255, idx)));
            }
        }
    }

    proptest! {
        #[test]
        fn proptest_probe_port_unique(
            base_port in 1u16..=65535,
            first_ttl in 1u8..=255,
            span in 0u8..=40,
            nprobes in 1u8..=16,
        ) {
            let max_ttl = first_ttl.saturating_add(span);
            let mut seen = HashSet::new();
            for ttl in first_ttl..=max_ttl {
                for idx in 0..nprobes {
                    prop_assert!(seen.insert(probe_port(base_port, ttl, nprobes, idx)));
                }
            }
        }
    }
}
