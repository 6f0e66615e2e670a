// SPDX-License-Identifier: MIT

//! Error taxonomy for the orchestration layer (§7), one variant family per
//! component that can actually fail.

use thiserror::Error;

use ueventd_core::SeqNum;

/// Errors from [`crate::queue::EventQueue`] operations. Both are advisory —
/// callers log and continue rather than treat them as fatal (§7: "queue-
/// marker touch/unlink failures: warn, continue").
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to touch queue marker: {0}")]
    MarkerCreate(String),
    #[error("failed to remove queue marker: {0}")]
    MarkerRemove(String),
}

/// Errors from [`crate::dispatch::Dispatcher`].
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to spawn worker: {0}")]
    SpawnFailed(String),
    #[error("dispatch send to worker for seqnum {seqnum} failed: {reason}")]
    SendFailed { seqnum: SeqNum, reason: String },
    #[error("rules database unavailable: {0}")]
    RulesUnavailable(String),
}

/// Errors from [`crate::workers::WorkerPool`].
#[derive(Debug, Error)]
pub enum WorkerPoolError {
    #[error("pool is at capacity ({children_max})")]
    AtCapacity { children_max: u32 },
    #[error("pid {0} is not a valid worker pid")]
    InvalidPid(i32),
    #[error("no worker tracked for pid {0}")]
    UnknownWorker(i32),
    #[error("worker for pid {0} already has an event attached")]
    AlreadyAttached(i32),
}

/// Errors from [`crate::synth::plan_synthesis`] and its `DeviceFs` port.
#[derive(Debug, Error)]
pub enum SynthesizeError {
    #[error("failed to open devnode: {0}")]
    OpenFailed(String),
    #[error("failed to lock devnode: {0}")]
    LockFailed(String),
    #[error("BLKRRPART ioctl failed: {0}")]
    RereadFailed(String),
    #[error("failed to write uevent trigger at {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}
