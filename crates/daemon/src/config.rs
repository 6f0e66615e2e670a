// SPDX-License-Identifier: MIT

//! Daemon-level configuration: on-disk paths plus the merge of CLI flags
//! and kernel-command-line `udev.*` overrides into a
//! [`ueventd_core::config::Config`] (§6).

use std::path::PathBuf;

use tracing::warn;

use ueventd_core::cmdline::{self, CmdlineOverride};
use ueventd_core::config::{Config as CoreConfig, ResolveNameTiming};

use crate::env;
use crate::lifecycle::LifecycleError;

/// Filesystem layout under the state directory (§5, §6).
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    /// Inbound uevent source the daemon binds and drains (§6 "Inbound from
    /// kernel" substitute — see `ueventd-adapters::uevent_source`).
    pub uevent_socket: PathBuf,
    /// Outbound address the daemon republishes processed devices to, for
    /// local subscribers (§6 "Outbound monitor"). Not bound by the daemon
    /// itself.
    pub subscriber_socket: PathBuf,
    pub worker_ack_socket: PathBuf,
    pub worker_endpoint_dir: PathBuf,
    pub control_socket: PathBuf,
    pub queue_marker: PathBuf,
    pub lock_file: PathBuf,
    pub worker_bin: PathBuf,
}

impl Paths {
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = env::state_dir()?;
        Ok(Self {
            uevent_socket: state_dir.join("uevent.sock"),
            subscriber_socket: state_dir.join("uevent-subscriber.sock"),
            worker_ack_socket: state_dir.join("worker-ack.sock"),
            worker_endpoint_dir: state_dir.join("workers"),
            control_socket: state_dir.join("ueventd-ctrl.sock"),
            queue_marker: state_dir.join("queue"),
            lock_file: state_dir.join("ueventd.pid"),
            worker_bin: env::worker_bin_path(),
            state_dir,
        })
    }
}

/// CLI flags recognized by `ueventd` (§6): `-d` run in background,
/// `-D` debug (do not daemonize, log to stderr), `-c` max commands in
/// parallel i.e. `children_max`, `-e` exec-delay seconds, `-t` event-timeout
/// seconds, `-N` resolve-names early/late/never.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub daemonize: Option<bool>,
    pub debug: Option<bool>,
    pub children_max: Option<u32>,
    pub exec_delay_secs: Option<u32>,
    pub event_timeout_secs: Option<u32>,
    pub resolve_names: Option<ResolveNameTiming>,
}

/// Build the runtime [`CoreConfig`], applying kernel-command-line `udev.*`
/// overrides first and then CLI flags on top, so CLI always wins when both
/// set the same knob (§6).
pub fn build_core_config(cli: &CliOverrides) -> CoreConfig {
    let mut config = CoreConfig {
        children_max: default_children_max(),
        ..CoreConfig::default()
    };

    let (overrides, rejected) = cmdline::parse_cmdline(&env::kernel_cmdline());
    for (key, value) in &rejected {
        warn!(key, value, "ignoring unrecognized or malformed udev.* cmdline override");
    }
    for o in overrides {
        match o {
            CmdlineOverride::LogPriority(_) => {
                // Log-level is applied by the daemon's own logging setup,
                // not the runtime config — see main.rs.
            }
            CmdlineOverride::ChildrenMax(n) => config.children_max = n,
            CmdlineOverride::ExecDelaySecs(s) => config.exec_delay = std::time::Duration::from_secs(s as u64),
            CmdlineOverride::EventTimeoutSecs(s) => config.event_timeout = std::time::Duration::from_secs(s as u64),
        }
    }

    if let Some(v) = cli.daemonize {
        config.daemonize = v;
    }
    if let Some(v) = cli.debug {
        config.debug = v;
    }
    if let Some(v) = cli.children_max {
        config.children_max = v;
    }
    if let Some(s) = cli.exec_delay_secs {
        config.exec_delay = std::time::Duration::from_secs(s as u64);
    }
    if let Some(s) = cli.event_timeout_secs {
        config.event_timeout = std::time::Duration::from_secs(s as u64);
    }
    if let Some(v) = cli.resolve_names {
        config.resolve_names = v;
    }

    config
}

/// §4.8: `8 + 8 * cpu_count`, clamped to `[10, physical_memory / 128 MiB]`.
fn default_children_max() -> u32 {
    let cpus = std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(1);
    let mem = physical_memory_bytes().unwrap_or(1 << 30);
    ueventd_core::config::default_children_max(cpus, mem)
}

/// Physical memory in bytes, read from `/proc/meminfo`'s `MemTotal` line
/// (kB). Returns `None` if unavailable, letting the caller fall back to a
/// conservative default rather than failing startup over it.
fn physical_memory_bytes() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/meminfo").ok()?;
    let line = contents.lines().find(|l| l.starts_with("MemTotal:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}
