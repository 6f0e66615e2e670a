// SPDX-License-Identifier: MIT

use std::time::Instant;

use ueventd_core::{Device, EventState, Pid, WorkerEndpoint};

use super::*;
use crate::test_support::{FakeMonitorPublisher, FakeQueueMarker, FakeRulesFreshness, FakeWorkerSpawner};
use crate::workers::ReapedStatus;

#[tokio::test]
async fn ack_marks_worker_idle_and_frees_event() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();
    m.dispatch(&rules, &spawner, Instant::now()).await;

    let pid = m.pool.iter().next().unwrap().pid;
    let freed = m.handle_ack(pid, &marker);

    assert!(freed.is_some());
    assert_eq!(m.queue.len(), 0);
    assert!(m.pool.get(pid).unwrap().is_idle());
}

#[tokio::test]
async fn s6_worker_failure_republishes_kernel_view_and_frees_worker() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/d", "add"), &marker);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();
    m.dispatch(&rules, &spawner, Instant::now()).await;

    let pid = m.pool.iter().next().unwrap().pid;
    let monitor = FakeMonitorPublisher::default();

    let result = m.reap(pid, ReapedStatus::Exited(1), &monitor, &marker).await;

    assert!(matches!(result.outcome, crate::workers::ReapOutcome::Failed));
    assert_eq!(monitor.published.lock().unwrap().len(), 1);
    assert_eq!(monitor.published.lock().unwrap()[0].devpath, "/d");
    assert_eq!(m.queue.len(), 0);
    assert!(m.pool.get(pid).is_none());
}

#[tokio::test]
async fn reap_normal_exit_does_not_publish_but_still_frees_the_event() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/d", "add"), &marker);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();
    m.dispatch(&rules, &spawner, Instant::now()).await;
    let pid = m.pool.iter().next().unwrap().pid;
    let monitor = FakeMonitorPublisher::default();

    let result = m.reap(pid, ReapedStatus::Exited(0), &monitor, &marker).await;

    assert!(matches!(result.outcome, crate::workers::ReapOutcome::Normal));
    assert!(monitor.published.lock().unwrap().is_empty());
    // §4.4 `free(w)`: "remove from map, free attached event if any" applies
    // to every non-Ignored outcome, not just Failed — otherwise the event
    // would linger RUNNING forever and permanently block its conflicts.
    assert_eq!(m.queue.len(), 0);
}

#[tokio::test]
async fn timeout_kill_then_reap_frees_the_event_so_later_conflicts_unblock() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();
    let armed_at = Instant::now();
    m.dispatch(&rules, &spawner, armed_at).await;
    let pid = m.pool.iter().next().unwrap().pid;

    // A later event that conflicts (same devpath) with the running one.
    m.enqueue_device(Device::new(2, "/a", "add"), &marker);

    let past_kill = armed_at + std::time::Duration::from_micros(30_000_001);
    let report = m.check_timeouts(&spawner, past_kill);
    assert_eq!(report.killed, vec![ueventd_core::SeqNum(1)]);
    assert!(m.pool.get(pid).unwrap().is_killed());

    // The kernel reports the SIGKILL as a signalled termination after the
    // KILLED transition, which `classify_reap` maps to `Normal` (§4.4).
    let monitor = FakeMonitorPublisher::default();
    let result = m
        .reap(pid, ReapedStatus::Signalled(9), &monitor, &marker)
        .await;

    assert!(matches!(result.outcome, crate::workers::ReapOutcome::Normal));
    assert!(monitor.published.lock().unwrap().is_empty());
    assert_eq!(m.queue.len(), 1);
    assert_eq!(m.queue.iter().next().unwrap().seqnum(), ueventd_core::SeqNum(2));

    // With seq 1 gone, seq 2 is no longer blocked.
    assert_eq!(
        crate::conflict::check(&mut m.queue, ueventd_core::SeqNum(2)),
        crate::conflict::ConflictOutcome::NotBlocked
    );
}

#[test]
fn s9_set_env_upserts_then_unsets_and_restarts_workers_each_time() {
    let mut m = Manager::new(1, 4, 30_000_000);
    m.pool
        .create(Pid(500), WorkerEndpoint("w".into()))
        .unwrap();
    let spawner = FakeWorkerSpawner::default();

    m.set_env("FOO".into(), Some("bar".into()), &spawner);
    assert_eq!(m.env_overrides.get("FOO"), Some(&Some("bar".to_string())));
    assert!(m.pool.get(Pid(500)).unwrap().is_killed());

    // Respawn a fresh worker to exercise the second restart.
    m.pool.create(Pid(501), WorkerEndpoint("w2".into())).unwrap();
    m.set_env("FOO".into(), None, &spawner);
    assert_eq!(m.env_overrides.get("FOO"), Some(&None));
    assert!(m.pool.get(Pid(501)).unwrap().is_killed());

    assert_eq!(spawner.terminated.lock().unwrap().len(), 2);
}

#[test]
fn reload_invalidates_rules_and_kills_workers_without_touching_queue() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    m.pool.create(Pid(500), WorkerEndpoint("w".into())).unwrap();
    let rules = FakeRulesFreshness::default();
    rules.mark_fresh();
    let spawner = FakeWorkerSpawner::default();

    m.reload(&rules, &spawner);

    assert!(!rules.is_built());
    assert!(m.pool.get(Pid(500)).unwrap().is_killed());
    assert_eq!(m.queue.len(), 1);
}

#[test]
fn graceful_shutdown_drops_queued_but_keeps_running_events() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    m.enqueue_device(Device::new(2, "/b", "add"), &marker);
    m.queue
        .find_by_seqnum_mut(ueventd_core::SeqNum(1))
        .unwrap()
        .state = EventState::Running;
    let spawner = FakeWorkerSpawner::default();

    m.begin_graceful_shutdown(&spawner, &marker);

    assert!(m.exit);
    assert_eq!(m.queue.len(), 1);
    assert_eq!(m.queue.iter().next().unwrap().seqnum(), ueventd_core::SeqNum(1));
}

#[tokio::test]
async fn check_timeouts_warns_once_at_a_third_and_kills_at_the_full_deadline() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();
    let armed_at = Instant::now();
    m.dispatch(&rules, &spawner, armed_at).await;
    let pid = m.pool.iter().next().unwrap().pid;

    let before_warn = armed_at;
    let report = m.check_timeouts(&spawner, before_warn);
    assert!(report.warned.is_empty());
    assert!(report.killed.is_empty());

    let past_warn = armed_at + std::time::Duration::from_micros(10_000_001);
    let report = m.check_timeouts(&spawner, past_warn);
    assert_eq!(report.warned, vec![ueventd_core::SeqNum(1)]);
    assert!(report.killed.is_empty());

    // A second scan past the same warn deadline does not warn again.
    let report = m.check_timeouts(&spawner, past_warn);
    assert!(report.warned.is_empty());

    let past_kill = armed_at + std::time::Duration::from_micros(30_000_001);
    let report = m.check_timeouts(&spawner, past_kill);
    assert_eq!(report.killed, vec![ueventd_core::SeqNum(1)]);
    assert!(m.pool.get(pid).unwrap().is_killed());
    assert_eq!(spawner.killed.lock().unwrap().len(), 1);

    // Idempotent: scanning again past the kill deadline doesn't resend.
    m.check_timeouts(&spawner, past_kill);
    assert_eq!(spawner.killed.lock().unwrap().len(), 1);
}

#[test]
fn check_timeouts_ignores_queued_events_with_no_armed_worker() {
    let mut m = Manager::new(1, 4, 30_000_000);
    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    let spawner = FakeWorkerSpawner::default();

    let report = m.check_timeouts(&spawner, Instant::now() + std::time::Duration::from_secs(3600));

    assert!(report.warned.is_empty());
    assert!(report.killed.is_empty());
}

#[test]
fn is_quiescent_requires_exit_and_both_empty() {
    let mut m = Manager::new(1, 4, 30_000_000);
    assert!(!m.is_quiescent());
    m.exit = true;
    assert!(m.is_quiescent());

    let marker = FakeQueueMarker::default();
    m.enqueue_device(Device::new(1, "/a", "add"), &marker);
    assert!(!m.is_quiescent());
}
