//! socket2-backed probe sockets with a `poll(2)` readiness wait.

use crate::parser::IPPROTO_GRE;
use crate::{PacketSink, PacketSource, SourceSinkHandle};
use hoptrace_common::{Protocol, TraceParameters, TracerouteError};
use socket2::{Domain, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::os::fd::AsRawFd;
use std::time::{Duration, Instant};
use tracing::debug;

/// Opens the send socket matching `params.protocol` and the raw ICMP
/// receive socket.
pub fn new_source_sink(params: &TraceParameters) -> Result<SourceSinkHandle, TracerouteError> {
    // The receive socket needs the same privilege as every raw send socket,
    // so open it first and fail early.
    let source = IcmpSource::new()?;
    let sink = SocketSink::new(params.protocol, params.source, params.interface.as_deref())?;

    Ok(SourceSinkHandle {
        source: Box::new(source),
        sink: Box::new(sink),
    })
}

fn creation_error(err: io::Error) -> TracerouteError {
    if err.kind() == io::ErrorKind::PermissionDenied {
        TracerouteError::PermissionDenied
    } else {
        TracerouteError::SocketCreation(err)
    }
}

/// Datagram or raw socket that carries probes.
pub struct SocketSink {
    socket: Socket,
}

impl SocketSink {
    /// Creates the send socket for `protocol`, bound to `source` when it is
    /// specified and to `interface` when one is named.
    pub fn new(
        protocol: Protocol,
        source: Ipv4Addr,
        interface: Option<&str>,
    ) -> Result<Self, TracerouteError> {
        let socket = match protocol {
            Protocol::Udp => Socket::new(Domain::IPV4, Type::DGRAM, Some(socket2::Protocol::UDP)),
            Protocol::Icmp => {
                Socket::new(Domain::IPV4, Type::RAW, Some(socket2::Protocol::ICMPV4))
            }
            Protocol::Tcp => Socket::new(Domain::IPV4, Type::RAW, Some(socket2::Protocol::TCP)),
            Protocol::Gre => Socket::new(
                Domain::IPV4,
                Type::RAW,
                Some(socket2::Protocol::from(i32::from(IPPROTO_GRE))),
            ),
        }
        .map_err(creation_error)?;

        if !source.is_unspecified() {
            socket
                .bind(&SockAddr::from(SocketAddrV4::new(source, 0)))
                .map_err(|e| TracerouteError::SocketBind {
                    target: source.to_string(),
                    source: e,
                })?;
        }

        if let Some(name) = interface {
            bind_interface(&socket, name).map_err(|e| TracerouteError::SocketBind {
                target: name.to_string(),
                source: e,
            })?;
        }

        debug!(%protocol, %source, ?interface, "Opened send socket");
        Ok(Self { socket })
    }
}

#[cfg(any(target_os = "linux", target_os = "android", target_os = "fuchsia"))]
fn bind_interface(socket: &Socket, name: &str) -> io::Result<()> {
    socket.bind_device(Some(name.as_bytes()))
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn bind_interface(socket: &Socket, name: &str) -> io::Result<()> {
    let c_name = std::ffi::CString::new(name)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let index = unsafe { libc::if_nametoindex(c_name.as_ptr()) };
    let index = std::num::NonZeroU32::new(index)
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such interface"))?;
    socket.bind_device_by_index_v4(Some(index))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "fuchsia",
    target_os = "macos",
    target_os = "ios"
)))]
fn bind_interface(_socket: &Socket, _name: &str) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "binding to an interface is not supported on this platform",
    ))
}

impl PacketSink for SocketSink {
    fn set_ttl(&mut self, ttl: u8) -> io::Result<()> {
        self.socket.set_ttl(u32::from(ttl))
    }

    fn send_to(&mut self, buf: &[u8], addr: SocketAddrV4) -> io::Result<usize> {
        self.socket.send_to(buf, &SockAddr::from(addr))
    }
}

/// Raw ICMP socket observing all ICMP traffic delivered to the host.
pub struct IcmpSource {
    socket: Socket,
}

impl IcmpSource {
    /// Opens the receive socket. Requires root or `CAP_NET_RAW`.
    pub fn new() -> Result<Self, TracerouteError> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(socket2::Protocol::ICMPV4))
            .map_err(creation_error)?;
        socket
            .set_nonblocking(true)
            .map_err(TracerouteError::SocketCreation)?;
        Ok(Self { socket })
    }
}

impl PacketSource for IcmpSource {
    fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let mut fds = libc::pollfd {
                fd: self.socket.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            };
            let rc = unsafe { libc::poll(&mut fds as *mut _, 1, poll_timeout_ms(remaining)) };
            if rc > 0 {
                return Ok(true);
            }
            if rc == 0 {
                return Ok(false);
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.read(buf)
    }
}

/// Converts a remaining budget to a `poll` timeout, rounding up so that a
/// sub-millisecond remainder does not turn into a busy loop.
fn poll_timeout_ms(remaining: Duration) -> libc::c_int {
    let ms = remaining.as_nanos().div_ceil(1_000_000);
    ms.min(libc::c_int::MAX as u128) as libc::c_int
}
