// SPDX-License-Identifier: MIT

//! `ueventd`: the event dispatch engine's process shell (C1/C6/C8, §4.1,
//! §4.6, §4.8) — wires the real Linux adapters from `ueventd-adapters` into
//! an `ueventd-engine::Manager` and drives it from a single-threaded
//! `tokio::select!` reactor. Exposed as a library (in addition to the
//! `ueventd` binary in `main.rs`) so `ueventadm` can reuse the control-socket
//! wire codec and the root `ueventd-specs` integration tests can drive a
//! whole daemon process's state directory layout directly.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod control;
pub mod env;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod protocol_wire;
pub mod reactor;

pub use config::{CliOverrides, Paths};
pub use lifecycle::{Daemon, LifecycleError};
pub use logging::LogController;
pub use reactor::ExitOutcome;
