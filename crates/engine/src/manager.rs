// SPDX-License-Identifier: MIT

//! The manager (`M` in spec terms, §3): process-wide orchestration state
//! threading the queue, worker pool, and dynamic overrides together behind
//! the operations §4.4–§4.7 describe. Owns no fds/sockets itself — those
//! are wired by `ueventd-daemon`'s reactor, which holds the concrete
//! [`crate::ports`] implementations this type is generic over.

use std::collections::HashMap;
use std::time::Instant;

use ueventd_core::{Device, Pid, SeqNum};

use crate::dispatch::{self, DispatchFlags, DispatchReport};
use crate::ports::{MonitorPublisher, QueueMarker, RulesFreshness, WorkerSpawner};
use crate::queue::EventQueue;
use crate::synth::{self, WatchedDevice};
use crate::workers::{ReapOutcome, ReapedStatus, WorkerPool};

/// Manager state (§3 "Manager"). Generic-free: callers pass port trait
/// objects into each operation rather than this type owning `Arc<dyn ...>`
/// fields, so engine-level tests can swap fakes per call without
/// constructing a whole wired-up manager.
pub struct Manager {
    pub queue: EventQueue,
    pub pool: WorkerPool,
    /// Dynamic property overrides (§4.6 `SET_ENV`): `None` means "unset for
    /// children", matching spec.md's `key -> value|null` map.
    pub env_overrides: HashMap<String, Option<String>>,
    pub stop_exec_queue: bool,
    pub exit: bool,
    pub owner_pid: i32,
    pub event_timeout_usec: u64,
    last_freshness_check: Option<Instant>,
}

impl Manager {
    pub fn new(owner_pid: i32, children_max: u32, event_timeout_usec: u64) -> Self {
        Self {
            queue: EventQueue::new(),
            pool: WorkerPool::new(children_max),
            env_overrides: HashMap::new(),
            stop_exec_queue: false,
            exit: false,
            owner_pid,
            event_timeout_usec,
            last_freshness_check: None,
        }
    }

    /// §4.2 `enqueue`: build and append an event for a freshly arrived
    /// device.
    pub fn enqueue_device(&mut self, dev: Device, marker: &dyn QueueMarker) {
        self.queue
            .enqueue(dev, self.event_timeout_usec, self.owner_pid, marker);
    }

    /// Run one dispatcher pass (§4.5), throttling the rules-freshness check
    /// to [`ueventd_core::config::CONFIG_FRESHNESS_CHECK_INTERVAL`].
    pub async fn dispatch(
        &mut self,
        rules: &dyn RulesFreshness,
        spawner: &dyn WorkerSpawner,
        now: Instant,
    ) -> DispatchReport {
        if dispatch::should_check_freshness(
            self.last_freshness_check,
            now,
            ueventd_core::config::CONFIG_FRESHNESS_CHECK_INTERVAL,
        ) {
            self.last_freshness_check = Some(now);
        }

        dispatch::run_once(
            &mut self.queue,
            &mut self.pool,
            DispatchFlags {
                stop_exec_queue: self.stop_exec_queue,
                exit: self.exit,
            },
            rules,
            spawner,
            &self.env_overrides,
            now,
        )
        .await
    }

    /// Handle a worker ack (§1 data flow: "the parent receives the ack ...
    /// the worker becomes idle and the event is freed"). Returns the freed
    /// event's seqnum, if the pid was a tracked worker with an event
    /// attached.
    pub fn handle_ack(&mut self, pid: Pid, marker: &dyn QueueMarker) -> Option<SeqNum> {
        let seqnum = self.pool.mark_idle(pid)?;
        self.queue.remove(seqnum, self.owner_pid, marker);
        Some(seqnum)
    }

    /// Handle a reaped child (SIGCHLD path, §4.4). On the failure path,
    /// publishes the unamended `dev_kernel` view and signals the caller to
    /// drop the device-database entry (external — the caller does that,
    /// this only returns the device to publish). Always frees the worker
    /// from the pool.
    pub async fn reap(
        &mut self,
        pid: Pid,
        status: ReapedStatus,
        monitor: &dyn MonitorPublisher,
        marker: &dyn QueueMarker,
    ) -> ReapResult {
        let had_event = self.pool.get(pid).map(|w| w.event.is_some()).unwrap_or(false);
        let outcome = self.pool.classify_reap(pid, status, had_event);

        let mut published = None;
        if !matches!(outcome, ReapOutcome::Ignored) {
            if let Some(seqnum) = self.pool.free(pid) {
                if matches!(outcome, ReapOutcome::Failed) {
                    if let Some(event) = self.queue.find_by_seqnum(seqnum) {
                        let dev_kernel = event.dev_kernel.clone();
                        monitor.publish(&dev_kernel).await;
                        published = Some(dev_kernel);
                    }
                }
                self.queue.remove(seqnum, self.owner_pid, marker);
            }
        }

        ReapResult { outcome, published }
    }

    /// §4.7 inotify close-after-write → synthesized change event.
    pub fn synthesize_change(
        &self,
        dev: &WatchedDevice,
        fs: &dyn crate::ports::DeviceFs,
    ) -> Result<(), crate::error::SynthesizeError> {
        synth::synthesize(dev, fs)
    }

    /// §4.6 `SET_ENV`: upsert or mark-unset a dynamic property. SIGTERMs
    /// all non-killed workers so the new value takes effect on respawn.
    pub fn set_env(&mut self, key: String, value: Option<String>, spawner: &dyn WorkerSpawner) {
        self.env_overrides.insert(key, value);
        self.pool.kill_all_non_killed(spawner);
    }

    /// §4.6 `SET_LOG_LEVEL`: the actual logger reload is the daemon's job;
    /// this only performs the spec-mandated worker restart.
    pub fn restart_workers_for_config_change(&mut self, spawner: &dyn WorkerSpawner) {
        self.pool.kill_all_non_killed(spawner);
    }

    /// §4.6 `RELOAD`: drop cached rules/builtins, SIGTERM all workers.
    /// Does not touch the queue.
    pub fn reload(&mut self, rules: &dyn RulesFreshness, spawner: &dyn WorkerSpawner) {
        rules.invalidate();
        self.pool.kill_all_non_killed(spawner);
    }

    /// §4.8 graceful shutdown: stop accepting new traffic is the reactor's
    /// job; this drops all `QUEUED` events (leaving `RUNNING` ones to
    /// finish) and SIGTERMs every non-killed worker.
    pub fn begin_graceful_shutdown(&mut self, spawner: &dyn WorkerSpawner, marker: &dyn QueueMarker) {
        self.exit = true;
        self.queue
            .cleanup(ueventd_core::CleanupFilter::Queued, self.owner_pid, marker);
        self.pool.kill_all_non_killed(spawner);
    }

    /// §4.1/§5 idle-worker cleanup: fired by the reactor's 3s timer when no
    /// pending events have disarmed it in the meantime.
    pub fn terminate_idle_workers(&mut self, spawner: &dyn WorkerSpawner) {
        self.pool.terminate_idle(spawner);
    }

    /// §4.1 post-iteration hook: whether the loop should terminate (queue
    /// and pool both empty and `exit` is set).
    pub fn is_quiescent(&self) -> bool {
        self.exit && self.queue.is_empty() && self.pool.is_empty()
    }

    /// §4.5 per-event timers: scan `RUNNING` events for crossed warn/kill
    /// deadlines. Each event warns at most once (`DeviceEvent::warned`
    /// latches); the hard deadline SIGKILLs via [`WorkerPool::kill_one`],
    /// which is itself idempotent, so a repeated scan before the reap lands
    /// never sends a second signal.
    pub fn check_timeouts(&mut self, spawner: &dyn WorkerSpawner, now: Instant) -> TimeoutReport {
        let mut report = TimeoutReport::default();
        for event in self.queue.iter_mut() {
            let Some(worker) = event.worker else { continue };
            if !event.warned {
                if let Some(deadline) = event.warn_deadline() {
                    if now >= deadline {
                        event.warned = true;
                        report.warned.push(event.seqnum());
                    }
                }
            }
            if let Some(deadline) = event.kill_deadline() {
                if now >= deadline {
                    self.pool.kill_one(worker, spawner);
                    report.killed.push(event.seqnum());
                }
            }
        }
        report
    }
}

/// Outcome of [`Manager::reap`].
pub struct ReapResult {
    pub outcome: ReapOutcome,
    pub published: Option<Device>,
}

/// Outcome of [`Manager::check_timeouts`]: seqnums warned or hard-killed
/// this scan, for the reactor to log (§4.5, §8 property 10).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeoutReport {
    pub warned: Vec<SeqNum>,
    pub killed: Vec<SeqNum>,
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
