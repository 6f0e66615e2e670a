// SPDX-License-Identifier: MIT

//! Real Linux implementations of the `ueventd-engine` ports, plus (behind
//! `test-support`) in-memory fakes reused by `ueventd-daemon`'s own tests.
//!
//! Every module here corresponds to an "external collaborator" spec.md
//! carves out of the core: the netlink monitor transport, the worker
//! fork/exec substitute (§9), devnode locking/ioctls, the inotify watch
//! registry, and the rules-freshness check.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(feature = "test-support", allow(clippy::unwrap_used))]
#![cfg_attr(feature = "test-support", allow(clippy::expect_used))]
#![cfg_attr(feature = "test-support", allow(clippy::panic))]

pub mod ack_receiver;
pub mod device_fs;
pub mod error;
pub mod inotify_watch;
pub mod monitor;
pub mod queue_marker;
pub mod rules_freshness;
pub mod uevent_source;
pub mod worker_main;
pub mod worker_spawner;

pub use ack_receiver::{AckReceiver, RealAckReceiver, WorkerAck};
pub use device_fs::RealDeviceFs;
pub use error::AdapterError;
pub use inotify_watch::{InotifyOutcome, InotifyRegistry};
pub use monitor::RealMonitorPublisher;
pub use queue_marker::FileQueueMarker;
pub use rules_freshness::MtimeRulesFreshness;
pub use uevent_source::{RealUeventSource, UeventSource};
pub use worker_main::{NoopRuleEngine, RuleEngine};
pub use worker_spawner::RealWorkerSpawner;
