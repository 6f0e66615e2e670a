// SPDX-License-Identifier: MIT

//! Real uevent/monitor inbound source (§6 "Inbound from kernel"): the
//! netlink multicast transport itself is the external "monitor" codec
//! spec.md excludes from the core, so this adapter substitutes a framed
//! `UnixDatagram` carrying JSON-encoded [`Device`] records — the same wire
//! shape `ueventd-adapters::monitor`/`worker_spawner` already use for the
//! parent<->worker unicast variant of the monitor (glossary: "Monitor").
//!
//! §5 requires draining with `MSG_DONTWAIT` in a loop until `EAGAIN`; this
//! adapter's [`UeventSource::drain`] does exactly that over the async
//! datagram socket.

use async_trait::async_trait;
use tokio::net::UnixDatagram;
use tracing::warn;

use ueventd_core::Device;

use crate::error::AdapterError;

/// Maximum single uevent payload accepted from the monitor socket.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Port over the kernel uevent stream: the parent only ever needs to wait
/// for readability and drain whatever is pending.
#[async_trait]
pub trait UeventSource: Send + Sync {
    /// Suspend until the monitor fd is readable (§5: the parent suspends
    /// only in the event loop's poll).
    async fn readable(&self) -> Result<(), AdapterError>;

    /// Drain every pending device, non-blocking, until `EAGAIN` (§5).
    /// Malformed datagrams are logged and skipped rather than treated as
    /// fatal — a single corrupt uevent must not wedge the loop.
    fn drain(&self) -> Vec<Device>;
}

pub struct RealUeventSource {
    socket: UnixDatagram,
}

impl RealUeventSource {
    /// Bind the monitor socket at `path`, sizing its receive buffer per
    /// §4.8 ("set the monitor's receive buffer to 128 MiB").
    pub fn bind(path: &std::path::Path) -> Result<Self, AdapterError> {
        let _ = std::fs::remove_file(path);
        let std_socket = std::os::unix::net::UnixDatagram::bind(path)?;
        std_socket.set_nonblocking(true)?;
        set_rcvbuf(&std_socket, ueventd_core::config::MONITOR_RCVBUF_BYTES);
        let socket = UnixDatagram::from_std(std_socket)?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl UeventSource for RealUeventSource {
    async fn readable(&self) -> Result<(), AdapterError> {
        self.socket.readable().await?;
        Ok(())
    }

    fn drain(&self) -> Vec<Device> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.socket.try_recv(&mut buf) {
                Ok(n) => match serde_json::from_slice::<Device>(&buf[..n]) {
                    Ok(dev) => out.push(dev),
                    Err(e) => warn!(error = %e, "dropping malformed uevent datagram"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "uevent monitor recv failed");
                    break;
                }
            }
        }
        out
    }
}

fn set_rcvbuf(socket: &std::os::unix::net::UnixDatagram, bytes: usize) {
    if let Err(e) = nix::sys::socket::setsockopt(socket, nix::sys::socket::sockopt::RcvBuf, &bytes) {
        warn!(error = %e, bytes, "failed to set monitor SO_RCVBUF");
    }
}
