// SPDX-License-Identifier: MIT

//! The dispatcher (C5, §4.5): matches ready events to idle workers, spawns
//! new workers up to the cap, and attaches per-event timers.

use std::collections::HashMap;
use std::time::Instant;

use ueventd_core::{EventState, SeqNum};

use crate::conflict::{self, ConflictOutcome};
use crate::ports::{RulesFreshness, WorkerSpawner};
use crate::queue::EventQueue;
use crate::workers::WorkerPool;

/// `stop_exec_queue`/`exit` flags the dispatcher consults every run (§4.5
/// step 1, §8 "Manager" flags). Owned by the caller (the daemon's control
/// handler flips them); the dispatcher only reads them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatchFlags {
    pub stop_exec_queue: bool,
    pub exit: bool,
}

/// What happened during one dispatcher pass, for logging/idle-timer
/// bookkeeping by the caller.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub dispatched: Vec<SeqNum>,
    pub reloaded: bool,
    pub ran: bool,
}

/// Throttled rules/builtins freshness check (§4.5 step 2): at most every
/// [`crate::CONFIG_FRESHNESS_CHECK_INTERVAL`]-equivalent interval, supplied
/// by the caller since the constant lives in `ueventd-core::config`.
pub fn should_check_freshness(last_check: Option<Instant>, now: Instant, interval: std::time::Duration) -> bool {
    match last_check {
        None => true,
        Some(t) => now.duration_since(t) >= interval,
    }
}

/// Run one dispatcher pass (§4.5 steps 1–5).
///
/// `env` is the manager's dynamic property overrides (§4.6 `SET_ENV`),
/// threaded into every `spawn` call so children always see the latest
/// values. Returns a report the caller uses to decide idle-timer
/// arm/disarm and structured logging.
pub async fn run_once(
    queue: &mut EventQueue,
    pool: &mut WorkerPool,
    flags: DispatchFlags,
    rules: &dyn RulesFreshness,
    spawner: &dyn WorkerSpawner,
    env: &HashMap<String, Option<String>>,
    now: Instant,
) -> DispatchReport {
    let mut report = DispatchReport::default();

    // Step 1.
    if queue.is_empty() || flags.exit || flags.stop_exec_queue {
        return report;
    }
    report.ran = true;

    // Step 2 (freshness check itself is performed by the caller via
    // `should_check_freshness`; here we only act on staleness).
    if rules.is_stale() {
        pool.kill_all_non_killed(spawner);
        rules.invalidate();
        report.reloaded = true;
    }

    // Step 4: lazily rebuild if absent.
    if !rules.is_built() {
        rules.mark_fresh();
    }

    // Step 5: scan in arrival order.
    let candidates: Vec<SeqNum> = queue
        .iter()
        .filter(|e| e.state == EventState::Queued)
        .map(|e| e.seqnum())
        .collect();

    for seqnum in candidates {
        if conflict::check(queue, seqnum) == ConflictOutcome::Blocked {
            continue;
        }

        let Some(event) = queue.find_by_seqnum(seqnum) else {
            continue;
        };
        let dev = event.dev.clone();

        // Prefer an existing idle worker; an unresponsive one is killed and
        // the next idle candidate is tried before falling back to spawning
        // (§4.5 step 5: "if send fails, SIGKILL the worker, mark KILLED, try
        // the next").
        let mut attached = false;
        loop {
            let idle_pid = pool.idle_workers().next().map(|w| (w.pid, w.endpoint.clone()));
            let Some((pid, endpoint)) = idle_pid else { break };

            match spawner.send(&endpoint, &dev).await {
                Ok(()) => {
                    if let Some(event) = queue.find_by_seqnum_mut(seqnum) {
                        if pool.attach(pid, event, now).is_ok() {
                            report.dispatched.push(seqnum);
                            attached = true;
                        }
                    }
                    break;
                }
                Err(_) => {
                    spawner.kill(pid);
                    pool.free(pid);
                    // try the next idle worker, if any
                }
            }
        }
        if attached {
            continue;
        }

        if pool.is_at_capacity() {
            break;
        }

        match spawner.spawn(&dev, env).await {
            Ok((pid, endpoint)) => {
                if pool.create(pid, endpoint).is_err() {
                    continue;
                }
                if let Some(event) = queue.find_by_seqnum_mut(seqnum) {
                    if pool.attach(pid, event, now).is_ok() {
                        report.dispatched.push(seqnum);
                    }
                }
            }
            Err(_) => break,
        }
    }

    report
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
