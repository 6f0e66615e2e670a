// SPDX-License-Identifier: MIT

//! Real worker-ack receiver (§4.5 "send one fixed-size ack message on the
//! worker-write socket (the parent uses SO_PASSCRED to authenticate)").
//!
//! The parent rejects messages whose sender pid is not a tracked worker and
//! messages whose size does not match the fixed ack frame (§5, §7) — this
//! module only decodes and authenticates; the daemon's reactor is the one
//! that checks the sender pid against the worker pool.

use std::io::IoSliceMut;
use std::os::unix::io::AsRawFd;

use async_trait::async_trait;
use nix::sys::socket::{self, ControlMessageOwned, MsgFlags, UnixAddr};
use tokio::net::UnixDatagram;
use tracing::warn;

use ueventd_core::Pid;

use crate::error::AdapterError;

/// Fixed-size ack frame the worker writes on completion. The payload
/// itself carries no information the parent needs — identity comes from
/// `SCM_CREDENTIALS` — so this is just a one-byte sentinel.
pub const ACK_FRAME: [u8; 1] = [0x01];
pub const ACK_FRAME_LEN: usize = ACK_FRAME.len();

/// One decoded, credential-checked ack.
#[derive(Debug, Clone, Copy)]
pub struct WorkerAck {
    pub sender_pid: Pid,
}

#[async_trait]
pub trait AckReceiver: Send + Sync {
    async fn readable(&self) -> Result<(), AdapterError>;

    /// Receive and authenticate one pending ack. Returns `Ok(None)` when
    /// nothing is pending (non-blocking, per §5's `MSG_DONTWAIT` policy).
    fn try_recv(&self) -> Result<Option<WorkerAck>, AdapterError>;
}

/// Real worker-ack socket: a `SOCK_DGRAM` `AF_UNIX` pair's read end, bound
/// with `SO_PASSCRED` so every datagram arrives with `SCM_CREDENTIALS`
/// (§4.8 startup: "create the worker socketpair with SO_PASSCRED on the
/// read end").
pub struct RealAckReceiver {
    socket: UnixDatagram,
}

impl RealAckReceiver {
    pub fn bind(path: &std::path::Path) -> Result<Self, AdapterError> {
        let _ = std::fs::remove_file(path);
        let std_socket = std::os::unix::net::UnixDatagram::bind(path)?;
        std_socket.set_nonblocking(true)?;
        socket::setsockopt(&std_socket, socket::sockopt::PassCred, &true)
            .map_err(|e| AdapterError::SpawnFailed(format!("SO_PASSCRED: {e}")))?;
        let socket = UnixDatagram::from_std(std_socket)?;
        Ok(Self { socket })
    }
}

#[async_trait]
impl AckReceiver for RealAckReceiver {
    async fn readable(&self) -> Result<(), AdapterError> {
        self.socket.readable().await?;
        Ok(())
    }

    fn try_recv(&self) -> Result<Option<WorkerAck>, AdapterError> {
        let fd = self.socket.as_raw_fd();
        let mut buf = [0u8; 256];
        let mut iov = [IoSliceMut::new(&mut buf)];
        let mut cmsg_space = nix::cmsg_space!(nix::sys::socket::UnixCredentials);

        let msg = match socket::recvmsg::<UnixAddr>(fd, &mut iov, Some(&mut cmsg_space), MsgFlags::MSG_DONTWAIT) {
            Ok(msg) => msg,
            Err(nix::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(AdapterError::Nix(e)),
        };

        let len = msg.bytes;
        if len != ACK_FRAME_LEN {
            warn!(got = len, want = ACK_FRAME_LEN, "dropping malformed worker ack");
            return Err(AdapterError::MalformedAck {
                got: len,
                want: ACK_FRAME_LEN,
            });
        }

        let creds = msg.cmsgs().ok().and_then(|mut cmsgs| {
            cmsgs.find_map(|c| match c {
                ControlMessageOwned::ScmCredentials(creds) => Some(creds),
                _ => None,
            })
        });

        let Some(creds) = creds else {
            return Err(AdapterError::MissingCredentials);
        };

        Ok(Some(WorkerAck {
            sender_pid: Pid(creds.pid()),
        }))
    }
}
