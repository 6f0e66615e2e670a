// SPDX-License-Identifier: MIT

//! Traits ("ports", per SPEC_FULL.md §0) through which the orchestration
//! layer talks to everything spec.md calls an external collaborator: the
//! rule engine, the netlink monitor, devnode locking/ioctl, and the
//! filesystem marker. `ueventd-adapters` provides the real Linux
//! implementations plus an in-memory fake of each, gated behind the
//! `test-support` feature, for engine-level unit tests.

use std::collections::HashMap;

use async_trait::async_trait;

use ueventd_core::{Device, Pid, WorkerEndpoint};

use crate::error::{DispatchError, QueueError, SynthesizeError};

/// Forks/execs a new worker process (§4.5 "Spawning") and delivers device
/// messages to an already-running one.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    /// Spawn a new worker, handing it `initial` as its first device
    /// (§4.5: "the child ... process the initial device"), with the given
    /// dynamic environment overrides (§4.6 `SET_ENV`) applied.
    async fn spawn(
        &self,
        initial: &Device,
        env: &HashMap<String, Option<String>>,
    ) -> Result<(Pid, WorkerEndpoint), DispatchError>;

    /// Deliver a device to an already-spawned, idle worker.
    async fn send(&self, endpoint: &WorkerEndpoint, device: &Device) -> Result<(), DispatchError>;

    /// SIGTERM a worker (graceful: reload, env change, log-level change,
    /// idle cleanup, shutdown).
    fn terminate(&self, pid: Pid);

    /// SIGKILL a worker (dispatch-send failure, hard timeout).
    fn kill(&self, pid: Pid);
}

/// Republishes a processed (or, on failure, unamended) device on the main
/// monitor socket for local subscribers (§4.4 failure fan-out, §4.5 worker
/// success path).
#[async_trait]
pub trait MonitorPublisher: Send + Sync {
    async fn publish(&self, device: &Device);
}

/// The on-disk `/run/udev/queue` presence marker (§5), touched on first
/// enqueue and unlinked on last dequeue — but only by the manager's owning
/// pid.
pub trait QueueMarker: Send + Sync {
    fn touch(&self) -> Result<(), QueueError>;
    fn remove(&self) -> Result<(), QueueError>;
}

/// Whether the cached rules database (or builtins) are stale (§4.5 step 2).
/// An external collaborator here: the rule compiler itself is out of scope.
pub trait RulesFreshness: Send + Sync {
    /// Returns true if rules/builtins changed since the database was last
    /// built, forcing the dispatcher to invalidate its cache and reload.
    fn is_stale(&self) -> bool;

    /// Mark the cache as freshly (re)built.
    fn mark_fresh(&self);

    /// Drop the cached rules database, forcing the next dispatch to
    /// rebuild it (§4.8 RELOAD: "discard cached rules and builtins").
    fn invalidate(&self);

    /// Whether a rules database has ever been built in this run (§4.5 step
    /// 4: "lazily (re)build ... if absent").
    fn is_built(&self) -> bool;
}

/// Devnode-level filesystem operations the inotify synthesizer (§4.7)
/// needs: advisory locking, the `BLKRRPART` reread ioctl, enumerating
/// partition children, and writing the `change` trigger to sysfs.
pub trait DeviceFs: Send + Sync {
    /// Try to reread the partition table of a whole-disk devnode.
    /// `Ok(true)` means the reread itself succeeded (kernel will emit its
    /// own events); `Ok(false)`/`Err` both fall through to the manual
    /// `change` trigger per §4.7 step 1.
    fn reread_partition_table(&self, devnode: &str) -> Result<bool, SynthesizeError>;

    /// List the syspaths of partition children of a disk's syspath.
    fn partition_children(&self, disk_syspath: &str) -> Vec<String>;

    /// Write the `"change\n"` token to `{syspath}/uevent`.
    fn write_change_trigger(&self, syspath: &str) -> Result<(), SynthesizeError>;
}
