// SPDX-License-Identifier: MIT

use super::*;
use crate::device::Device;
use std::time::Duration;
use yare::parameterized;

fn dev(seq: u64) -> Device {
    Device::new(seq, "/devices/x", "add")
}

#[test]
fn new_event_starts_queued_with_no_worker() {
    let e = DeviceEvent::new(dev(1), 30_000_000);
    assert_eq!(e.state, EventState::Queued);
    assert!(e.worker.is_none());
    assert!(e.delaying_seqnum.is_none());
    assert!(e.armed_at.is_none());
    assert!(!e.warned);
}

#[test]
fn dev_kernel_is_a_snapshot_independent_of_dev() {
    let mut e = DeviceEvent::new(dev(1), 1_000_000);
    e.dev.properties.insert("ID_FOO".into(), "bar".into());
    assert!(e.dev_kernel.properties.is_empty());
}

#[test]
fn warn_and_kill_deadlines_are_none_until_armed() {
    let e = DeviceEvent::new(dev(1), 30_000_000);
    assert!(e.warn_deadline().is_none());
    assert!(e.kill_deadline().is_none());
}

#[test]
fn warn_deadline_is_one_third_of_kill_deadline() {
    let mut e = DeviceEvent::new(dev(1), 30_000_000);
    let now = std::time::Instant::now();
    e.armed_at = Some(now);
    let warn = e.warn_deadline().unwrap();
    let kill = e.kill_deadline().unwrap();
    assert_eq!(warn, now + Duration::from_micros(10_000_000));
    assert_eq!(kill, now + Duration::from_micros(30_000_000));
}

#[parameterized(
    any_matches_queued = { CleanupFilter::Any, EventState::Queued, true },
    any_matches_running = { CleanupFilter::Any, EventState::Running, true },
    queued_matches_queued = { CleanupFilter::Queued, EventState::Queued, true },
    queued_rejects_running = { CleanupFilter::Queued, EventState::Running, false },
)]
fn cleanup_filter_matches(case: (CleanupFilter, EventState, bool)) {
    let (filter, state, expected) = case;
    assert_eq!(filter.matches(state), expected);
}
