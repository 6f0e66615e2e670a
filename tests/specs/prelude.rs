//! Test helpers for behavioral specifications.
//!
//! Spawns a real `ueventd` process against a temporary state directory and
//! drives it with `ueventadm`, the same way a human operator would from a
//! shell.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 2_000;

/// Poll a condition until it returns true or the timeout elapses.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(timeout_ms);
    let poll = Duration::from_millis(SPEC_POLL_INTERVAL_MS);
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll);
    }
    false
}

/// Resolve a workspace binary, preferring the standard debug target
/// directory. Falls back to resolving relative to the test binary itself,
/// since `CARGO_MANIFEST_DIR` points at this crate, not the ones producing
/// `ueventd`/`ueventadm`.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }
    standard
}

pub fn ueventd_binary() -> PathBuf {
    binary_path("ueventd")
}

pub fn ueventadm_binary() -> PathBuf {
    binary_path("ueventadm")
}

/// A running `ueventd` instance bound to its own temporary state directory,
/// so tests never touch the real `/run/udev`.
pub struct DaemonHarness {
    child: Child,
    state_dir: tempfile::TempDir,
}

impl DaemonHarness {
    /// Start `ueventd -D` (foreground, debug logging) against a fresh state
    /// directory and block until the control socket is accepting
    /// connections.
    pub fn start() -> Self {
        let state_dir = tempfile::tempdir().expect("tempdir");
        let child = Command::new(ueventd_binary())
            .arg("-D")
            .env("UEVENTD_STATE_DIR", state_dir.path())
            .env("UEVENTD_WORKER_BIN", "/bin/true")
            .env("UEVENTD_CMDLINE", "")
            .env("UEVENTD_RULES_DIRS", state_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn ueventd");

        let harness = Self { child, state_dir };
        let socket = harness.control_socket();
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || socket.exists()),
            "ueventd did not create its control socket within {SPEC_WAIT_MAX_MS}ms"
        );
        // UnixListener::bind creates the path before accept() is ready to
        // service connections; a zero-op ping confirms the accept loop is
        // actually live, not just the socket file.
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || harness.ueventadm(&["ping"]).output().map(
                |o| o.status.success()
            ).unwrap_or(false)),
            "ueventd never answered a control ping"
        );
        harness
    }

    pub fn state_path(&self) -> &Path {
        self.state_dir.path()
    }

    pub fn control_socket(&self) -> PathBuf {
        self.state_dir.path().join("ueventd-ctrl.sock")
    }

    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.path().join("ueventd.pid")
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Build a `ueventadm` invocation pointed at this instance's socket.
    pub fn ueventadm(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(ueventadm_binary());
        cmd.arg("--socket").arg(self.control_socket()).args(args);
        cmd
    }

    pub fn run_ueventadm(&self, args: &[&str]) -> Output {
        self.ueventadm(args).output().expect("ueventadm should run")
    }

    /// Send SIGTERM (the same signal `systemctl stop` delivers) and wait up
    /// to `timeout_ms` for the process to exit on its own.
    pub fn sigterm_and_wait(&mut self, timeout_ms: u64) -> bool {
        let pid = nix::unistd::Pid::from_raw(self.child.id() as i32);
        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
        wait_for(timeout_ms, || {
            matches!(self.child.try_wait(), Ok(Some(_)))
        })
    }
}

impl Drop for DaemonHarness {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
