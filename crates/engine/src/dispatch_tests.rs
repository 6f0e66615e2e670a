// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::time::Instant;

use ueventd_core::{Device, EventState};

use super::*;
use crate::test_support::{FakeQueueMarker, FakeRulesFreshness, FakeWorkerSpawner};

fn queue_with(devices: Vec<Device>) -> EventQueue {
    let mut q = EventQueue::new();
    let marker = FakeQueueMarker::default();
    for d in devices {
        q.enqueue(d, 1_000_000, 1, &marker);
    }
    q
}

fn env() -> HashMap<String, Option<String>> {
    HashMap::new()
}

#[tokio::test]
async fn s4_independent_events_dispatch_concurrently_up_to_cap() {
    let mut q = queue_with(vec![
        Device::new(1, "/a", "add").with_devnum(8, 0, true),
        Device::new(2, "/b", "add").with_devnum(8, 16, true),
    ]);
    let mut pool = WorkerPool::new(4);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert_eq!(report.dispatched.len(), 2);
    assert_eq!(pool.len(), 2);
    assert!(q.iter().all(|e| e.state == EventState::Running));
}

#[tokio::test]
async fn s5_cap_serializes_independent_events() {
    let mut q = queue_with(vec![
        Device::new(1, "/a", "add"),
        Device::new(2, "/b", "add"),
        Device::new(3, "/c", "add"),
    ]);
    let mut pool = WorkerPool::new(1);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(pool.len(), 1);
    let running = q.iter().filter(|e| e.state == EventState::Running).count();
    assert_eq!(running, 1);
}

#[tokio::test]
async fn blocked_descendant_is_not_dispatched_while_ancestor_runs() {
    let mut q = queue_with(vec![Device::new(1, "/a/b", "add"), Device::new(2, "/a/b/c", "add")]);
    let mut pool = WorkerPool::new(4);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert_eq!(report.dispatched, vec![ueventd_core::SeqNum(1)]);
    assert_eq!(
        q.find_by_seqnum(ueventd_core::SeqNum(2)).unwrap().state,
        EventState::Queued
    );
}

#[tokio::test]
async fn empty_queue_is_a_noop() {
    let mut q = EventQueue::new();
    let mut pool = WorkerPool::new(4);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert!(!report.ran);
}

#[tokio::test]
async fn stop_exec_queue_flag_makes_dispatch_a_noop() {
    let mut q = queue_with(vec![Device::new(1, "/a", "add")]);
    let mut pool = WorkerPool::new(4);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags {
            stop_exec_queue: true,
            exit: false,
        },
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert!(!report.ran);
    assert_eq!(pool.len(), 0);
}

#[tokio::test]
async fn exit_flag_makes_dispatch_a_noop() {
    let mut q = queue_with(vec![Device::new(1, "/a", "add")]);
    let mut pool = WorkerPool::new(4);
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags {
            stop_exec_queue: false,
            exit: true,
        },
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert!(!report.ran);
}

#[tokio::test]
async fn stale_rules_trigger_reload_and_kill_all_workers() {
    let mut q = queue_with(vec![Device::new(1, "/a", "add")]);
    let mut pool = WorkerPool::new(4);
    pool.create(ueventd_core::Pid(500), ueventd_core::WorkerEndpoint("w".into()))
        .unwrap();
    let rules = FakeRulesFreshness::default();
    *rules.stale.lock().unwrap() = true;
    let spawner = FakeWorkerSpawner::default();

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert!(report.reloaded);
    assert!(pool.get(ueventd_core::Pid(500)).unwrap().is_killed());
    assert_eq!(spawner.terminated.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn reload_does_not_drop_queued_events() {
    let mut q = queue_with(vec![Device::new(1, "/a", "add")]);
    let mut pool = WorkerPool::new(4);
    let rules = FakeRulesFreshness::default();
    *rules.stale.lock().unwrap() = true;
    let spawner = FakeWorkerSpawner::default();

    run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    // Event survived reload and still gets dispatched in the same pass
    // once the cache is marked fresh again.
    assert_eq!(q.len(), 1);
}

#[tokio::test]
async fn dispatch_send_failure_kills_worker_and_tries_next() {
    let mut q = queue_with(vec![Device::new(1, "/a", "add")]);
    let mut pool = WorkerPool::new(4);
    let bad_endpoint = ueventd_core::WorkerEndpoint("bad".into());
    pool.create(ueventd_core::Pid(500), bad_endpoint.clone()).unwrap();
    // mark idle explicitly (create() already leaves it idle)
    let rules = FakeRulesFreshness::default();
    let spawner = FakeWorkerSpawner::default();
    spawner.fail_send_to.lock().unwrap().push(bad_endpoint);

    let report = run_once(
        &mut q,
        &mut pool,
        DispatchFlags::default(),
        &rules,
        &spawner,
        &env(),
        Instant::now(),
    )
    .await;

    assert_eq!(spawner.killed.lock().unwrap(), vec![ueventd_core::Pid(500)]);
    assert!(pool.get(ueventd_core::Pid(500)).is_none());
    // Dispatcher fell through to spawning a fresh worker for the event.
    assert_eq!(report.dispatched.len(), 1);
    assert_eq!(pool.len(), 1);
}

#[test]
fn freshness_check_is_throttled_by_interval() {
    let now = Instant::now();
    assert!(should_check_freshness(None, now, std::time::Duration::from_secs(3)));
    assert!(!should_check_freshness(
        Some(now),
        now + std::time::Duration::from_secs(1),
        std::time::Duration::from_secs(3)
    ));
    assert!(should_check_freshness(
        Some(now),
        now + std::time::Duration::from_secs(3),
        std::time::Duration::from_secs(3)
    ));
}
