//! Error types for traceroute operations.

use crate::Protocol;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Main error type for traceroute operations.
#[derive(Error, Debug)]
pub enum TracerouteError {
    // Socket/IO errors
    #[error("Failed to create socket: {0}")]
    SocketCreation(#[source] std::io::Error),

    #[error("Failed to bind to {target}: {source}")]
    SocketBind {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("raw sockets require root or CAP_NET_RAW")]
    PermissionDenied,

    #[error("Read timeout exceeded")]
    ReadTimeout,

    #[error("Write failed: {0}")]
    WriteFailed(#[source] std::io::Error),

    // Packet errors
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Failed to parse {layer} layer: {reason}")]
    PacketParseFailed { layer: &'static str, reason: String },

    // Protocol errors
    #[error("{protocol} {operation} not implemented")]
    ProtocolNotImplemented {
        protocol: Protocol,
        operation: &'static str,
    },

    // Resolution errors
    #[error("unknown host {hostname}: {reason}")]
    DnsResolutionFailed { hostname: String, reason: String },

    #[error("no IPv4 address for {0}")]
    NoIpv4Address(IpAddr),

    // Configuration errors
    #[error("Invalid TTL range: first={first_ttl}, max={max_ttl}")]
    InvalidTtlRange { first_ttl: u8, max_ttl: u8 },

    #[error("max ttl must be > 0")]
    InvalidMaxTtl,

    #[error("nprobes must be > 0")]
    InvalidProbeCount,

    #[error("packet length must be <= {max}, got {actual}")]
    InvalidPacketLength { max: usize, actual: usize },

    #[error("wait time must be between 0 and {max:?}, got {actual}s")]
    InvalidWaitTime { max: Duration, actual: f64 },

    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TracerouteError {
    /// Returns true if this error is retryable (e.g., timeout, parse failure).
    ///
    /// Retryable errors indicate that we should continue reading packets rather than
    /// giving up. The receive socket sees every ICMP message delivered to the host, most
    /// of which belong to somebody else.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ReadTimeout | Self::PacketParseFailed { .. } | Self::PacketTooShort { .. }
        )
    }

    /// Returns true for the known gaps in TCP/GRE support.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::ProtocolNotImplemented { .. })
    }
}

impl From<std::io::Error> for TracerouteError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TracerouteError::ReadTimeout,
            std::io::ErrorKind::WouldBlock => TracerouteError::ReadTimeout,
            std::io::ErrorKind::PermissionDenied => TracerouteError::PermissionDenied,
            _ => TracerouteError::Internal(err.to_string()),
        }
    }
}
