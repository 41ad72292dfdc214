//! Trace orchestration for hoptrace.
//!
//! [`Tracer`] walks the TTL range, one probe in flight at a time, and
//! reports a [`HopOutcome`] per TTL. [`display`] renders hops the way
//! classic traceroute prints them; [`report`] is the JSON form.

pub mod display;
pub mod hop;
pub mod protocol;
pub mod report;
mod runner;

pub use display::{format_header, format_hop, DnsResolver, NameResolver, NumericResolver};
pub use hop::{HopOutcome, ProbeOutcome, ProbeReply, ReplyKind, TraceOutcome};
pub use protocol::ProbeKind;
pub use report::TraceReport;
pub use runner::Tracer;
