//! CLI for hoptrace.

mod runner;

use clap::Parser;
use hoptrace_common::{
    Protocol, TraceParameters, TracerouteError, DEFAULT_BASE_PORT, DEFAULT_FIRST_TTL,
    DEFAULT_MAX_TTL, DEFAULT_PACKET_LEN, DEFAULT_PROBES, DEFAULT_WAIT_SECS, MAX_WAIT_SECS,
};
use std::net::Ipv4Addr;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Print the route packets take to a network host.
#[derive(Parser, Debug)]
#[command(name = "hoptrace")]
#[command(version)]
#[command(about = "Print the route packets take to a network host")]
pub struct Args {
    /// Destination hostname or IPv4 address.
    #[arg(required = true)]
    pub host: String,

    /// Probe payload length in bytes.
    pub packetlen: Option<usize>,

    /// TTL of the first probe.
    #[arg(short = 'f', long = "first-ttl", short_alias = 'M', default_value_t = DEFAULT_FIRST_TTL)]
    pub first_ttl: u8,

    /// Maximum TTL.
    #[arg(short = 'm', long = "max-ttl", default_value_t = DEFAULT_MAX_TTL)]
    pub max_ttl: u8,

    /// Base destination port.
    #[arg(short, long, default_value_t = DEFAULT_BASE_PORT)]
    pub port: u16,

    /// Probes per TTL.
    #[arg(short = 'q', long = "nqueries", default_value_t = DEFAULT_PROBES)]
    pub nqueries: u8,

    /// Seconds to wait for each reply.
    #[arg(short, long, default_value_t = DEFAULT_WAIT_SECS as f64)]
    pub wait: f64,

    /// Probe protocol (udp, icmp, tcp, gre).
    #[arg(short = 'P', long, default_value = "udp")]
    pub proto: String,

    /// Use ICMP Echo probes (same as `-P icmp`).
    #[arg(short = 'I')]
    pub icmp: bool,

    /// Send probes through this interface.
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Source address of outgoing probes.
    #[arg(short, long)]
    pub source: Option<Ipv4Addr>,

    /// Print hop addresses numerically.
    #[arg(short = 'n')]
    pub numeric: bool,

    /// Print per-hop packet loss.
    #[arg(short = 'S', long)]
    pub summary: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit a JSON document instead of text lines.
    #[arg(long)]
    pub json: bool,
}

impl Args {
    fn protocol(&self) -> Result<Protocol, TracerouteError> {
        if self.icmp {
            return Ok(Protocol::Icmp);
        }
        self.proto.parse()
    }

    /// Builds trace parameters around the resolved addresses.
    fn to_params(
        &self,
        destination: Ipv4Addr,
        source: Ipv4Addr,
    ) -> Result<TraceParameters, TracerouteError> {
        let wait = Duration::try_from_secs_f64(self.wait).map_err(|_| {
            TracerouteError::InvalidWaitTime {
                max: Duration::from_secs(MAX_WAIT_SECS),
                actual: self.wait,
            }
        })?;

        let params = TraceParameters {
            protocol: self.protocol()?,
            first_ttl: self.first_ttl,
            max_ttl: self.max_ttl,
            nprobes: self.nqueries,
            base_port: self.port,
            wait,
            packet_len: self.packetlen.unwrap_or(DEFAULT_PACKET_LEN),
            verbose: self.verbose,
            summary: self.summary,
            destination,
            source,
            interface: self.interface.clone(),
        };
        params.validate()?;
        Ok(params)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match runner::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hoptrace: {}", e);
            ExitCode::FAILURE
        }
    }
}
