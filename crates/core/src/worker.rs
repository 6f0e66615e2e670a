// SPDX-License-Identifier: MIT

//! The worker record (`W` in spec terms): one per live child process.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::device::SeqNum;

/// OS process id of a worker child. Always `> 1` (see [`Pid::is_valid`]):
/// pid 1 is init and can never be a forked worker, and pid 0/negative values
/// are never handed back by `fork`/`posix_spawn`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(pub i32);

impl Pid {
    pub fn is_valid(&self) -> bool {
        self.0 > 1
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address the parent uses to deliver a device message to a specific worker.
/// Modeled as an opaque endpoint (a `UnixDatagram` path in
/// `ueventd-adapters`) rather than a concrete socket type so this crate
/// stays I/O-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerEndpoint(pub String);

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Idle,
    Killed,
}

/// One live child process and the single event (if any) attached to it.
///
/// Invariant (spec.md §3): at most one event is attached to a worker at any
/// time, and every attached event points back to this worker's `pid`. The
/// back-reference here (`event`) stores the attached event's `seqnum` rather
/// than owning the event — [`crate::event::DeviceEvent`] is owned solely by
/// the queue, per the cyclic-ownership note in spec.md §9.
#[derive(Debug, Clone)]
pub struct Worker {
    pub pid: Pid,
    pub state: WorkerState,
    pub event: Option<SeqNum>,
    pub endpoint: WorkerEndpoint,
}

impl Worker {
    pub fn new(pid: Pid, endpoint: WorkerEndpoint) -> Self {
        Self {
            pid,
            state: WorkerState::Idle,
            event: None,
            endpoint,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, WorkerState::Idle)
    }

    pub fn is_killed(&self) -> bool {
        matches!(self.state, WorkerState::Killed)
    }
}
