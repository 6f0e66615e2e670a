// SPDX-License-Identifier: MIT

//! The worker body (§4.5 "Spawning"): an exec'd separate process — the
//! substitution spec.md §9 sanctions for fork() in a language without a
//! fork-safe runtime — that loops processing one device at a time.
//!
//! Rule execution itself is the external collaborator (§1 "Out of scope");
//! [`RuleEngine`] is the port through which it's invoked, with
//! [`NoopRuleEngine`] standing in for the real rule compiler/interpreter
//! this workspace does not implement.

use std::path::{Path, PathBuf};

use nix::sys::prctl;
use nix::sys::signal::Signal;
use tokio::net::UnixDatagram;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use ueventd_core::Device;

use crate::ack_receiver::ACK_FRAME;
use crate::device_fs::{is_lock_exempt, try_lock_devnode_shared};
use crate::error::AdapterError;

/// Port over the rule engine (§1: "the rule parser and rule engine ...
/// performs node/symlink creation and program spawning" — external).
pub trait RuleEngine: Send + Sync {
    /// Apply rules to `device`, amending its `properties` in place.
    /// Returns `Err` if rule execution failed for this device; the worker
    /// logs and moves on rather than treating it as fatal (the parent's
    /// SIGCHLD failure fan-out, §4.4, is the only escalation path — a
    /// worker never exits non-zero just because one device's rules
    /// misfired, unless the rule engine itself says to abort the process).
    fn process(&self, device: &mut Device) -> Result<(), String>;
}

/// Stand-in used where no real rule engine is wired (e.g. integration
/// tests of the spawn/ack/timeout protocol): does nothing, always succeeds.
pub struct NoopRuleEngine;

impl RuleEngine for NoopRuleEngine {
    fn process(&self, _device: &mut Device) -> Result<(), String> {
        Ok(())
    }
}

/// Run the worker's main loop: process `initial`, ack, then block for the
/// next device on `endpoint_path` until the parent SIGTERMs it (§4.5).
pub async fn run(
    endpoint_path: PathBuf,
    ack_socket_path: PathBuf,
    initial: Device,
    rule_engine: &dyn RuleEngine,
) -> Result<(), AdapterError> {
    // Parent-death → SIGTERM (§4.5: "requests parent-death -> SIGTERM").
    if let Err(e) = prctl::set_pdeathsig(Some(Signal::SIGTERM)) {
        warn!(error = %e, "failed to set PR_SET_PDEATHSIG");
    }

    let _ = std::fs::remove_file(&endpoint_path);
    let socket = UnixDatagram::bind(&endpoint_path)?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let mut pending = Some(initial);
    loop {
        if let Some(mut device) = pending.take() {
            process_one(&mut device, rule_engine);
            if let Err(e) = send_ack(&ack_socket_path).await {
                warn!(error = %e, "failed to send worker ack");
            }
        }

        let mut buf = vec![0u8; 64 * 1024];
        tokio::select! {
            _ = sigterm.recv() => {
                info!("worker received SIGTERM, exiting");
                return Ok(());
            }
            result = socket.recv(&mut buf) => {
                match result {
                    Ok(n) => match serde_json::from_slice::<Device>(&buf[..n]) {
                        Ok(device) => pending = Some(device),
                        Err(e) => warn!(error = %e, "dropping malformed device message from parent"),
                    },
                    Err(e) => warn!(error = %e, "worker endpoint recv failed"),
                }
            }
        }
    }
}

/// Process a single device: take the shared advisory lock when §4.5
/// requires it, invoke the rule engine, and drop the lock before acking.
fn process_one(device: &mut Device, rule_engine: &dyn RuleEngine) {
    let needs_lock = device.is_block && !device.action.is_remove() && !is_lock_exempt(&device.sysname);

    // §4.5 "Spawning": the advisory lock is taken "(on partitions, on the
    // parent disk)" — a partition event locks its whole disk's devnode,
    // not its own, so it serializes against the exclusive BLKRRPART lock
    // the C7 synthesizer takes on the parent disk.
    let lock_target = if device.devtype == "partition" {
        device.parent_devnode.as_deref()
    } else {
        device.properties.get("DEVNAME").map(|s| s.as_str())
    };

    let _lock_guard = if needs_lock {
        match lock_target {
            Some(devnode) => match try_lock_devnode_shared(devnode) {
                Ok(guard) if guard.is_held() => Some(guard),
                Ok(_) => {
                    warn!(devpath = %device.devpath, "devnode lock held elsewhere, skipping rule execution");
                    return;
                }
                Err(e) => {
                    warn!(devpath = %device.devpath, error = %e, "failed to lock devnode, skipping rule execution");
                    return;
                }
            },
            None => None,
        }
    } else {
        None
    };

    if let Err(e) = rule_engine.process(device) {
        warn!(devpath = %device.devpath, error = %e, "rule engine failed");
    }
}

async fn send_ack(ack_socket_path: &Path) -> Result<(), AdapterError> {
    let socket = UnixDatagram::unbound()?;
    socket.send_to(&ACK_FRAME, ack_socket_path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use fs2::FileExt;

    use super::*;

    #[test]
    fn noop_rule_engine_always_succeeds() {
        let mut dev = Device::new(1, "/a", "add");
        assert!(NoopRuleEngine.process(&mut dev).is_ok());
    }

    struct RecordingRuleEngine {
        ran: AtomicBool,
    }

    impl RuleEngine for RecordingRuleEngine {
        fn process(&self, _device: &mut Device) -> Result<(), String> {
            self.ran.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn partition_event_locks_the_parent_disk_not_its_own_node() {
        let dir = tempfile::tempdir().unwrap();
        let disk = dir.path().join("sda");
        let partition = dir.path().join("sda1");
        std::fs::write(&disk, b"").unwrap();
        std::fs::write(&partition, b"").unwrap();

        // Hold the parent disk's exclusive lock, as the C7 synthesizer's
        // BLKRRPART reread does.
        let disk_file = std::fs::File::open(&disk).unwrap();
        disk_file.lock_exclusive().unwrap();

        let mut dev = Device::new(1, "/devices/.../sda/sda1", "add")
            .with_devnum(8, 1, true)
            .with_devtype("partition")
            .with_sysname("sda1")
            .with_parent_devnode(disk.to_str().unwrap());
        dev.properties
            .insert("DEVNAME".into(), partition.to_str().unwrap().to_string());

        let engine = RecordingRuleEngine { ran: AtomicBool::new(false) };
        process_one(&mut dev, &engine);

        // The parent disk is locked exclusively, so the partition's own
        // (unlocked) node would have succeeded were it the wrong target —
        // rules must have been skipped instead.
        assert!(!engine.ran.load(Ordering::SeqCst));
    }

    #[test]
    fn whole_disk_event_locks_its_own_node() {
        let dir = tempfile::tempdir().unwrap();
        let disk = dir.path().join("sdb");
        std::fs::write(&disk, b"").unwrap();

        let disk_file = std::fs::File::open(&disk).unwrap();
        disk_file.lock_exclusive().unwrap();

        let mut dev = Device::new(2, "/devices/.../sdb", "add")
            .with_devnum(8, 16, true)
            .with_devtype("disk")
            .with_sysname("sdb");
        dev.properties
            .insert("DEVNAME".into(), disk.to_str().unwrap().to_string());

        let engine = RecordingRuleEngine { ran: AtomicBool::new(false) };
        process_one(&mut dev, &engine);

        assert!(!engine.ran.load(Ordering::SeqCst));
    }

    #[test]
    fn non_block_event_runs_rules_without_locking() {
        let mut dev = Device::new(3, "/devices/.../eth0", "add").with_sysname("eth0");
        let engine = RecordingRuleEngine { ran: AtomicBool::new(false) };
        process_one(&mut dev, &engine);
        assert!(engine.ran.load(Ordering::SeqCst));
    }
}
