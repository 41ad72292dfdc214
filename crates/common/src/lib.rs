//! Core types, traits, and error handling for hoptrace.
//!
//! This crate provides the fundamental abstractions shared by every probe
//! protocol and by the trace orchestrator:
//!
//! - [`TraceParameters`] and [`Protocol`] describing one run
//! - [`probe_port`], the mapping from `(ttl, probe_index)` to a correlation key
//! - [`ProbeProtocol`], the build/validate contract each protocol implements
//! - [`TracerouteError`] for error handling

pub mod error;
pub mod traits;
pub mod types;

pub use error::TracerouteError;
pub use traits::{ProbePacket, ProbeProtocol};
pub use types::{probe_port, Protocol, TraceParameters};

pub const DEFAULT_FIRST_TTL: u8 = 1;
pub const DEFAULT_MAX_TTL: u8 = 30;
pub const DEFAULT_PROBES: u8 = 3;
pub const DEFAULT_BASE_PORT: u16 = 33434;
pub const DEFAULT_WAIT_SECS: u64 = 5;
pub const DEFAULT_PACKET_LEN: usize = 40;

/// Upper bound for the probe payload length.
pub const MAX_PACKET_LEN: usize = 1 << 15;
/// Upper bound for the per-probe wait, one day.
pub const MAX_WAIT_SECS: u64 = 86_400;
