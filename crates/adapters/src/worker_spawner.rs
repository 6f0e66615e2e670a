// SPDX-License-Identifier: MIT

//! Real `WorkerSpawner`: the fork-and-exec substitution spec.md §9
//! sanctions — "the worker body can be an exec'd separate program reading
//! device handles from a pipe". Each worker is a separate process running
//! [`crate::worker_main`]'s entry point, talking to the parent over a
//! per-worker `UnixDatagram` endpoint (the "unicast variant" of the
//! monitor, per the glossary).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use tokio::net::UnixDatagram;
use tokio::process::Command;
use tracing::warn;

use ueventd_core::{Device, Pid, WorkerEndpoint};
use ueventd_engine::error::DispatchError;
use ueventd_engine::ports::WorkerSpawner;

/// How long to wait, and how many times to retry, for a freshly spawned
/// worker to bind its receiving endpoint before giving up (§4.5 substitutes
/// synchronous `fork()` handoff with an exec'd process, so this bridges the
/// small startup race).
const BIND_RETRY_ATTEMPTS: u32 = 50;
const BIND_RETRY_INTERVAL: Duration = Duration::from_millis(20);

pub struct RealWorkerSpawner {
    worker_bin: PathBuf,
    endpoint_dir: PathBuf,
    ack_socket_path: PathBuf,
    next_id: AtomicU64,
}

impl RealWorkerSpawner {
    pub fn new(worker_bin: PathBuf, endpoint_dir: PathBuf, ack_socket_path: PathBuf) -> Self {
        Self {
            worker_bin,
            endpoint_dir,
            ack_socket_path,
            next_id: AtomicU64::new(0),
        }
    }

    fn endpoint_path(&self, id: u64) -> PathBuf {
        self.endpoint_dir.join(format!("worker-{id}.sock"))
    }
}

#[async_trait]
impl WorkerSpawner for RealWorkerSpawner {
    async fn spawn(
        &self,
        initial: &Device,
        env: &HashMap<String, Option<String>>,
    ) -> Result<(Pid, WorkerEndpoint), DispatchError> {
        std::fs::create_dir_all(&self.endpoint_dir)
            .map_err(|e| DispatchError::SpawnFailed(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let path = self.endpoint_path(id);
        let _ = std::fs::remove_file(&path);

        let initial_json =
            serde_json::to_string(initial).map_err(|e| DispatchError::SpawnFailed(e.to_string()))?;

        let mut cmd = Command::new(&self.worker_bin);
        cmd.arg(&path);
        cmd.env("UEVENTD_WORKER_INITIAL_DEVICE", initial_json);
        cmd.env("UEVENTD_ACK_SOCKET", &self.ack_socket_path);
        cmd.kill_on_drop(false);
        for (key, value) in env {
            match value {
                Some(v) => {
                    cmd.env(key, v);
                }
                None => {
                    cmd.env_remove(key);
                }
            }
        }

        let child = cmd
            .spawn()
            .map_err(|e| DispatchError::SpawnFailed(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| DispatchError::SpawnFailed("child exited before reporting a pid".into()))?;
        // The child owns its own lifecycle from here; the parent tracks it
        // purely through the worker pool and SIGCHLD, not a `Child` handle.
        std::mem::drop(child);

        for _ in 0..BIND_RETRY_ATTEMPTS {
            if path.exists() {
                return Ok((Pid(pid as i32), WorkerEndpoint(path.display().to_string())));
            }
            tokio::time::sleep(BIND_RETRY_INTERVAL).await;
        }

        Err(DispatchError::SpawnFailed(format!(
            "worker {pid} did not bind its endpoint at {}",
            path.display()
        )))
    }

    async fn send(&self, endpoint: &WorkerEndpoint, device: &Device) -> Result<(), DispatchError> {
        let payload = serde_json::to_vec(device).map_err(|e| DispatchError::SendFailed {
            seqnum: device.seqnum,
            reason: e.to_string(),
        })?;

        let socket = UnixDatagram::unbound().map_err(|e| DispatchError::SendFailed {
            seqnum: device.seqnum,
            reason: e.to_string(),
        })?;
        socket
            .send_to(&payload, &endpoint.0)
            .await
            .map_err(|e| DispatchError::SendFailed {
                seqnum: device.seqnum,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn terminate(&self, pid: Pid) {
        if let Err(e) = signal::kill(NixPid::from_raw(pid.0), Signal::SIGTERM) {
            warn!(pid = pid.0, error = %e, "failed to SIGTERM worker");
        }
    }

    fn kill(&self, pid: Pid) {
        if let Err(e) = signal::kill(NixPid::from_raw(pid.0), Signal::SIGKILL) {
            warn!(pid = pid.0, error = %e, "failed to SIGKILL worker");
        }
    }
}
