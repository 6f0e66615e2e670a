// SPDX-License-Identifier: MIT

//! The queued/running device event record (`E` in spec terms) and its
//! lifecycle state.

use std::time::Instant;

use crate::device::{Device, SeqNum};
use crate::worker::Pid;

/// Lifecycle state of a queued device event.
///
/// `Undef` is deliberately not a variant here: spec.md uses UNDEF only as a
/// wildcard value passed to `cleanup`, which this crate models as
/// [`CleanupFilter`] instead of folding it into the event's own state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Queued,
    Running,
}

/// Filter used by [`crate::event::DeviceEvent`] queue cleanup: `Any` is the
/// UNDEF wildcard from spec.md, `Queued` removes only not-yet-dispatched
/// events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupFilter {
    Any,
    Queued,
}

impl CleanupFilter {
    pub fn matches(&self, state: EventState) -> bool {
        match self {
            CleanupFilter::Any => true,
            CleanupFilter::Queued => state == EventState::Queued,
        }
    }
}

/// A single device event record, from enqueue to worker acknowledgment.
///
/// The event queue ([`crate`] consumers build this on top of
/// `ueventd-engine::queue::EventQueue`) is the sole owner of every
/// `DeviceEvent`, in both states. [`DeviceEvent::worker`] is a *non-owning*
/// back-reference (a pid, resolved against the worker pool's `pid -> Worker`
/// map on demand) — see DESIGN.md for why this crate picked queue-owns-all
/// over the alternative (worker-owns-event) spec.md's design notes mention.
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    /// Full (possibly rule-amended) device view.
    pub dev: Device,
    /// Unamended shallow view captured at enqueue time, used only for the
    /// worker-failure fan-out republish in C4.
    pub dev_kernel: Device,
    pub state: EventState,
    /// Non-owning back-reference to the worker processing this event while
    /// `state == Running`; always `None` while `Queued`.
    pub worker: Option<Pid>,
    /// Memo: the earliest seqnum known to currently block this event, used
    /// by the conflict detector's fast path. Deliberately *not* set by the
    /// identity checks (devnum/ifindex) — see spec.md §9's asymmetry note.
    pub delaying_seqnum: Option<SeqNum>,
    /// Event-specific timeout, copied from the manager config at enqueue
    /// time so a live `SET_` control message never retroactively changes an
    /// event already in flight.
    pub timeout_usec: u64,
    /// Set when the event is attached to a worker; `None` while queued.
    pub armed_at: Option<Instant>,
    /// Whether the `timeout/3` warning (§4.1, §4.5) has already been
    /// logged for this event, so the reactor's periodic timeout scan logs
    /// it exactly once (§8 property 10) rather than once per scan tick.
    pub warned: bool,
}

impl DeviceEvent {
    pub fn new(dev: Device, timeout_usec: u64) -> Self {
        Self {
            dev_kernel: dev.clone(),
            dev,
            state: EventState::Queued,
            worker: None,
            delaying_seqnum: None,
            timeout_usec,
            armed_at: None,
            warned: false,
        }
    }

    pub fn seqnum(&self) -> SeqNum {
        self.dev.seqnum
    }

    pub fn devpath(&self) -> &str {
        &self.dev.devpath
    }

    /// Warn deadline: a third of the way to the hard kill deadline (§4.1,
    /// §4.5: "warning at `timeout/3`").
    pub fn warn_deadline(&self) -> Option<Instant> {
        self.armed_at
            .map(|t| t + std::time::Duration::from_micros(self.timeout_usec / 3))
    }

    /// Hard kill deadline (§4.5: "the hard deadline SIGKILLs the worker").
    pub fn kill_deadline(&self) -> Option<Instant> {
        self.armed_at
            .map(|t| t + std::time::Duration::from_micros(self.timeout_usec))
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
