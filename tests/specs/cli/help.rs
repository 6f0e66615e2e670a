//! `--help`/`--version` specs for both binaries (§6).

use crate::prelude::*;
use std::process::Command;

#[test]
fn ueventd_help_lists_documented_flags() {
    let output = Command::new(ueventd_binary()).arg("--help").output().expect("run ueventd --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["-d", "-D", "-c", "-e", "-t", "-N"] {
        assert!(stdout.contains(flag), "--help missing {flag}\n{stdout}");
    }
}

#[test]
fn ueventadm_help_lists_subcommands() {
    let output = Command::new(ueventadm_binary()).arg("--help").output().expect("run ueventadm --help");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for sub in ["reload", "ping", "log-priority", "children-max", "property", "exit"] {
        assert!(stdout.contains(sub), "--help missing subcommand {sub}\n{stdout}");
    }
}
