//! `ueventadm` error-path specs: talking to a socket nobody is listening on.

use crate::prelude::*;
use std::process::Command;

#[test]
fn ping_against_a_missing_socket_fails_with_a_message() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing_socket = dir.path().join("does-not-exist.sock");

    let output = Command::new(ueventadm_binary())
        .arg("--socket")
        .arg(&missing_socket)
        .arg("ping")
        .output()
        .expect("run ueventadm ping");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not connect"), "unexpected stderr: {stderr}");
}

#[test]
fn no_subcommand_is_a_usage_error() {
    let output = Command::new(ueventadm_binary()).output().expect("run ueventadm");
    assert!(!output.status.success());
}
