// SPDX-License-Identifier: MIT

//! The event queue (C2, §4.2): an append-only-in-arrival-order list of
//! [`DeviceEvent`]s, with removal anywhere, plus the `/run/udev/queue`
//! marker lifecycle.

use std::collections::VecDeque;

use ueventd_core::{CleanupFilter, Device, DeviceEvent, EventState, SeqNum};

use crate::ports::QueueMarker;

/// The device-event queue. A `VecDeque` rather than the source's intrusive
/// doubly linked list — SPEC_FULL.md §4 notes this is fine at udev queue
/// depths, where removal is rare and O(n) is not a bottleneck.
pub struct EventQueue {
    events: VecDeque<DeviceEvent>,
    /// Pid that created the manager; only it may touch the on-disk marker
    /// (§3 "owner_pid", §5). `None` until the first `enqueue` pins it.
    owner_pid: Option<i32>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            owner_pid: None,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceEvent> {
        self.events.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeviceEvent> {
        self.events.iter_mut()
    }

    pub fn find_by_seqnum(&self, seqnum: SeqNum) -> Option<&DeviceEvent> {
        self.events.iter().find(|e| e.seqnum() == seqnum)
    }

    pub fn find_by_seqnum_mut(&mut self, seqnum: SeqNum) -> Option<&mut DeviceEvent> {
        self.events.iter_mut().find(|e| e.seqnum() == seqnum)
    }

    /// Append a new event built from `dev` in arrival order (§4.2
    /// `enqueue`). Pins `owner_pid` on first use and touches the on-disk
    /// marker if the queue was empty — best-effort per §7.
    pub fn enqueue(
        &mut self,
        dev: Device,
        timeout_usec: u64,
        owner_pid: i32,
        marker: &dyn QueueMarker,
    ) {
        if self.owner_pid.is_none() {
            self.owner_pid = Some(owner_pid);
        }
        let was_empty = self.events.is_empty();
        self.events.push_back(DeviceEvent::new(dev, timeout_usec));
        if was_empty {
            if let Err(e) = marker.touch() {
                tracing::warn!(error = %e, "failed to touch queue marker");
            }
        }
    }

    /// Remove a single event by seqnum (§4.2 `remove`): unlinks it and, if
    /// the queue is now empty and the caller is the owning pid, removes the
    /// on-disk marker.
    pub fn remove(&mut self, seqnum: SeqNum, caller_pid: i32, marker: &dyn QueueMarker) {
        let before = self.events.len();
        self.events.retain(|e| e.seqnum() != seqnum);
        if before != self.events.len() && self.events.is_empty() && self.owner_pid == Some(caller_pid) {
            if let Err(e) = marker.remove() {
                tracing::warn!(error = %e, "failed to remove queue marker");
            }
        }
    }

    /// Remove every event matching `filter` (§4.2 `cleanup`), e.g. dropping
    /// all `QUEUED` events on graceful shutdown (§4.8).
    pub fn cleanup(&mut self, filter: CleanupFilter, caller_pid: i32, marker: &dyn QueueMarker) {
        let before = self.events.len();
        self.events.retain(|e| !filter.matches(e.state));
        if before != self.events.len() && self.events.is_empty() && self.owner_pid == Some(caller_pid) {
            if let Err(e) = marker.remove() {
                tracing::warn!(error = %e, "failed to remove queue marker");
            }
        }
    }

    pub fn owner_pid(&self) -> Option<i32> {
        self.owner_pid
    }

    /// Count of events currently `QUEUED` (not yet attached to a worker).
    pub fn queued_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.state == EventState::Queued)
            .count()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
