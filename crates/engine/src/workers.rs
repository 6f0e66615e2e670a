// SPDX-License-Identifier: MIT

//! The worker pool (C4, §4.4): tracks child processes, enforces the
//! `children_max` cap, and drives reaping.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use ueventd_core::{DeviceEvent, Pid, SeqNum, Worker, WorkerEndpoint, WorkerState};

use crate::error::WorkerPoolError;
use crate::ports::WorkerSpawner;

/// Outcome of reaping one child pid via `waitpid(-1, WNOHANG)` (§4.4
/// "Reaping"), classified the way the spec distinguishes normal exit from
/// the failure fan-out path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// Exit status 0, or a signalled termination after a `KILLED`
    /// transition — expected, no fan-out.
    Normal,
    /// Non-zero exit, or an unexpected signal, while an event was
    /// attached — triggers the §4.4 failure fan-out.
    Failed,
    /// Stopped/continued: logged and ignored.
    Ignored,
}

/// `pid -> Worker` map plus the current cap, enforcing the invariants from
/// spec.md §3: at most one event per worker, pool size never exceeds
/// `children_max`.
pub struct WorkerPool {
    workers: HashMap<i32, Worker>,
    /// `AtomicU32` per SPEC_FULL.md §2.3/design note §9: control messages
    /// mutate this without taking the manager's lock.
    children_max: AtomicU32,
}

impl WorkerPool {
    pub fn new(children_max: u32) -> Self {
        Self {
            workers: HashMap::new(),
            children_max: AtomicU32::new(children_max),
        }
    }

    pub fn children_max(&self) -> u32 {
        self.children_max.load(Ordering::Relaxed)
    }

    pub fn set_children_max(&self, value: u32) {
        self.children_max.store(value, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn is_at_capacity(&self) -> bool {
        self.workers.len() as u32 >= self.children_max()
    }

    pub fn get(&self, pid: Pid) -> Option<&Worker> {
        self.workers.get(&pid.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub fn idle_workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values().filter(|w| w.is_idle())
    }

    /// Register a newly forked worker (§4.4 `create`).
    pub fn create(&mut self, pid: Pid, endpoint: WorkerEndpoint) -> Result<(), WorkerPoolError> {
        if !pid.is_valid() {
            return Err(WorkerPoolError::InvalidPid(pid.0));
        }
        self.workers.insert(pid.0, Worker::new(pid, endpoint));
        Ok(())
    }

    /// Attach an event to an idle worker (§4.4 `attach`): arms the
    /// warn/kill timers relative to `now` and transitions both sides to
    /// `Running`.
    pub fn attach(&mut self, pid: Pid, event: &mut DeviceEvent, now: Instant) -> Result<(), WorkerPoolError> {
        let worker = self
            .workers
            .get_mut(&pid.0)
            .ok_or(WorkerPoolError::UnknownWorker(pid.0))?;
        if worker.event.is_some() {
            return Err(WorkerPoolError::AlreadyAttached(pid.0));
        }
        worker.state = WorkerState::Running;
        worker.event = Some(event.seqnum());
        event.state = ueventd_core::EventState::Running;
        event.worker = Some(pid);
        event.armed_at = Some(now);
        Ok(())
    }

    /// Mark a worker idle and detach its event (§4.4 `mark_idle`). Does
    /// nothing if the worker was already `Killed` — a killed worker stays
    /// killed. Returns the detached event's seqnum, if any, so the caller
    /// can free it from the queue.
    pub fn mark_idle(&mut self, pid: Pid) -> Option<SeqNum> {
        let worker = self.workers.get_mut(&pid.0)?;
        if worker.is_killed() {
            return None;
        }
        worker.state = WorkerState::Idle;
        worker.event.take()
    }

    /// SIGTERM every worker not already `Killed` (§4.4 `kill_all_non_killed`),
    /// e.g. on reload, log-level change, env change.
    pub fn kill_all_non_killed(&mut self, spawner: &dyn WorkerSpawner) {
        for worker in self.workers.values_mut() {
            if !worker.is_killed() {
                worker.state = WorkerState::Killed;
                spawner.terminate(worker.pid);
            }
        }
    }

    /// SIGTERM every currently `Idle` worker (§4.1 post hook: "arm the
    /// 3-second idle-cleanup timer"; §5: "after 3s of no pending events,
    /// the reactor SIGTERMs them for cleanup"). `Running` workers are left
    /// alone — only idleness, not mere inactivity of the queue, triggers
    /// this.
    pub fn terminate_idle(&mut self, spawner: &dyn WorkerSpawner) {
        for worker in self.workers.values_mut() {
            if worker.is_idle() {
                worker.state = WorkerState::Killed;
                spawner.terminate(worker.pid);
            }
        }
    }

    /// SIGKILL a single worker and mark it `Killed` (§4.5 hard timeout:
    /// "the hard deadline SIGKILLs the worker and marks it KILLED"). A
    /// no-op if the worker is already `Killed`, so a repeated timeout scan
    /// never sends a second signal.
    pub fn kill_one(&mut self, pid: Pid, spawner: &dyn WorkerSpawner) {
        if let Some(worker) = self.workers.get_mut(&pid.0) {
            if !worker.is_killed() {
                worker.state = WorkerState::Killed;
                spawner.kill(worker.pid);
            }
        }
    }

    /// Remove a worker from the pool, returning its attached event's
    /// seqnum if any (§4.4 `free`).
    pub fn free(&mut self, pid: Pid) -> Option<SeqNum> {
        self.workers.remove(&pid.0).and_then(|w| w.event)
    }

    /// Classify a reaped pid's exit per §4.4. `had_attached_event` reflects
    /// whether the worker had an event attached at time of exit (read
    /// before the caller frees the worker).
    pub fn classify_reap(&self, pid: Pid, exit_status: ReapedStatus, had_attached_event: bool) -> ReapOutcome {
        let was_killed = self.get(pid).map(|w| w.is_killed()).unwrap_or(false);
        match exit_status {
            ReapedStatus::Exited(0) => ReapOutcome::Normal,
            ReapedStatus::Signalled(_) if was_killed => ReapOutcome::Normal,
            ReapedStatus::Exited(_) | ReapedStatus::Signalled(_) => {
                if had_attached_event {
                    ReapOutcome::Failed
                } else {
                    ReapOutcome::Normal
                }
            }
            ReapedStatus::StoppedOrContinued => ReapOutcome::Ignored,
        }
    }
}

/// A reaped child's termination shape, abstracted from the raw
/// `waitpid`/`WaitStatus` the real reaper sees (`ueventd-adapters`
/// translates `nix::sys::wait::WaitStatus` into this).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapedStatus {
    Exited(i32),
    Signalled(i32),
    StoppedOrContinued,
}

#[cfg(test)]
#[path = "workers_tests.rs"]
mod tests;
