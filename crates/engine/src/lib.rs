// SPDX-License-Identifier: MIT

//! Event-dispatch orchestration: the queue, conflict detector, worker pool,
//! dispatcher, and inotify synthesizer (C2–C5, C7) behind a small set of
//! ports so `ueventd-daemon` can wire real Linux adapters and
//! `ueventd-adapters::test-support` can wire fakes.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(feature = "test-support", allow(clippy::unwrap_used))]
#![cfg_attr(feature = "test-support", allow(clippy::expect_used))]
#![cfg_attr(feature = "test-support", allow(clippy::panic))]

pub mod conflict;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod ports;
pub mod queue;
pub mod synth;
pub mod workers;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use conflict::ConflictOutcome;
pub use dispatch::{DispatchFlags, DispatchReport};
pub use error::{DispatchError, QueueError, SynthesizeError, WorkerPoolError};
pub use manager::{Manager, ReapResult};
pub use ports::{DeviceFs, MonitorPublisher, QueueMarker, RulesFreshness, WorkerSpawner};
pub use queue::EventQueue;
pub use synth::WatchedDevice;
pub use workers::{ReapOutcome, ReapedStatus, WorkerPool};
