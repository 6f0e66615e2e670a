//! Startup and shutdown specs (C8, §4.8, §8 property 8 and scenario S8).

use crate::prelude::*;
use std::process::{Command, Stdio};

#[test]
fn second_instance_fails_to_acquire_the_lock() {
    let daemon = DaemonHarness::start();

    let second = Command::new(ueventd_binary())
        .arg("-D")
        .env("UEVENTD_STATE_DIR", daemon.state_path())
        .env("UEVENTD_WORKER_BIN", "/bin/true")
        .env("UEVENTD_CMDLINE", "")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .expect("spawn second ueventd");

    assert!(!second.status.success(), "a second instance must not start");
}

/// §8 property 8 / S8: SIGTERM with no running workers reaches quiescence
/// immediately and the loop exits well inside the 30s exit deadline.
#[test]
fn sigterm_with_no_running_workers_exits_promptly() {
    let mut daemon = DaemonHarness::start();
    assert!(
        daemon.sigterm_and_wait(5_000),
        "ueventd did not exit within 5s of SIGTERM with an empty worker pool"
    );
}

#[test]
fn shutdown_removes_the_control_socket() {
    let mut daemon = DaemonHarness::start();
    let socket = daemon.control_socket();
    assert!(daemon.sigterm_and_wait(5_000));
    assert!(!socket.exists(), "control socket should be removed on clean shutdown");
}

#[test]
fn shutdown_removes_the_lock_file() {
    let mut daemon = DaemonHarness::start();
    let lock = daemon.lock_file();
    assert!(daemon.sigterm_and_wait(5_000));
    assert!(!lock.exists(), "lock file should be removed on clean shutdown");
}
