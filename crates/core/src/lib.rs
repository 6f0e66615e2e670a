// SPDX-License-Identifier: MIT

//! Shared data model for the ueventd event dispatch engine.
//!
//! This crate is intentionally I/O-free: every type here is plain data or a
//! pure function over plain data, so the conflict detector, the queue and the
//! wire protocol can be unit tested without a runtime, a socket, or a clock.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod cmdline;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod protocol;
pub mod worker;

pub use device::{Action, Device, DevNum, IfIndex, SeqNum};
pub use error::CoreError;
pub use event::{CleanupFilter, DeviceEvent, EventState};
pub use worker::{Pid, Worker, WorkerEndpoint, WorkerState};
