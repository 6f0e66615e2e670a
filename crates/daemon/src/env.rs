// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::lifecycle::LifecycleError;

/// Resolve the state directory: `UEVENTD_STATE_DIR` > `XDG_STATE_HOME/ueventd`
/// > `/run/udev` (the real daemon's fixed location; overridable for tests
/// since binding a socket at `/run/udev` requires root).
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("UEVENTD_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("ueventd"));
    }
    Ok(PathBuf::from("/run/udev"))
}

/// Directory the worker binary lives in, so `RealWorkerSpawner` knows what
/// to `exec`. Defaults to alongside the daemon's own executable.
pub fn worker_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("UEVENTD_WORKER_BIN") {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("ueventd-worker")))
        .unwrap_or_else(|| PathBuf::from("ueventd-worker"))
}

/// `udev.*` overrides read from `/proc/cmdline`, or `UEVENTD_CMDLINE` in
/// tests where there is no real kernel command line to read.
pub fn kernel_cmdline() -> String {
    if let Ok(line) = std::env::var("UEVENTD_CMDLINE") {
        return line;
    }
    std::fs::read_to_string("/proc/cmdline").unwrap_or_default()
}

/// Directories the rules-freshness check watches for mtime changes
/// (§4.5 step 2). `UEVENTD_RULES_DIRS` is a colon-separated override for
/// tests; the real daemon watches the conventional three-tier udev
/// locations in priority order.
pub fn rules_dirs() -> Vec<PathBuf> {
    if let Ok(dirs) = std::env::var("UEVENTD_RULES_DIRS") {
        return std::env::split_paths(&dirs).collect();
    }
    vec![
        PathBuf::from("/etc/udev/rules.d"),
        PathBuf::from("/run/udev/rules.d"),
        PathBuf::from("/usr/lib/udev/rules.d"),
    ]
}

/// Version marker file for the builtin helper set, if the freshness check
/// should also track it (§4.5 step 2: "the rules file timestamps or the
/// builtin version changed").
pub fn builtin_version_file() -> Option<PathBuf> {
    std::env::var("UEVENTD_BUILTIN_VERSION_FILE").ok().map(PathBuf::from)
}
