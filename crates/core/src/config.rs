// SPDX-License-Identifier: MIT

//! Process-wide configuration (§9 "Global mutable configuration" design
//! note): an immutable-after-startup [`Config`], built once from CLI flags
//! and kernel-command-line overrides, plus the handful of constants spec.md
//! pins down exactly (§4.1, §4.8).

use std::time::Duration;

/// `-N/--resolve-names` CLI flag (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveNameTiming {
    Early,
    #[default]
    Late,
    Never,
}

impl ResolveNameTiming {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "early" => Some(Self::Early),
            "late" => Some(Self::Late),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

/// 3 seconds of no pending events before idle workers are SIGTERMed (§4.1).
pub const IDLE_WORKER_CLEANUP: Duration = Duration::from_secs(3);

/// 30-second grace period for graceful shutdown before the loop is forced
/// to exit with `ETIMEDOUT` (§4.1, §4.8).
pub const EXIT_DEADLINE: Duration = Duration::from_secs(30);

/// Throttle for the rules/builtins freshness check the dispatcher performs
/// on every wake (§4.5 step 2: "at most every 3 s").
pub const CONFIG_FRESHNESS_CHECK_INTERVAL: Duration = Duration::from_secs(3);

/// Cadence of the reactor's periodic RUNNING-event timeout scan, standing in
/// for spec.md's per-event warn/kill timers (§4.1, §4.5): short enough that
/// the warn-at-timeout/3 and kill-at-timeout deadlines are observed with
/// negligible slack.
pub const TIMEOUT_SCAN_INTERVAL: Duration = Duration::from_millis(500);

/// Default per-event timeout (10 minutes), overridable by
/// `-t/--event-timeout` or `udev.event_timeout=`.
pub const DEFAULT_EVENT_TIMEOUT: Duration = Duration::from_secs(600);

/// Monitor socket receive buffer size set at startup (§4.8: "128 MiB").
pub const MONITOR_RCVBUF_BYTES: usize = 128 * 1024 * 1024;

/// Memory budget, in bytes, that the default worker-cap formula divides the
/// physical memory by (§4.8).
pub const CHILDREN_MAX_MEMORY_DIVISOR: u64 = 128 * 1024 * 1024;

/// Lower bound on the default worker cap (§4.8).
pub const CHILDREN_MAX_FLOOR: u32 = 10;

/// Compute the default worker cap from the host's CPU count and physical
/// memory, per §4.8: `8 + 8 * cpu_count`, clamped to
/// `[10, physical_memory_bytes / (128 MiB)]`.
pub fn default_children_max(cpu_count: u32, physical_memory_bytes: u64) -> u32 {
    let raw = 8 + 8 * cpu_count;
    let memory_ceiling = (physical_memory_bytes / CHILDREN_MAX_MEMORY_DIVISOR) as u32;
    raw.clamp(CHILDREN_MAX_FLOOR, memory_ceiling.max(CHILDREN_MAX_FLOOR))
}

/// Immutable-after-startup configuration, assembled from CLI flags and
/// `udev.*` kernel-command-line overrides (CLI wins when both set the same
/// knob — see `ueventd-daemon::lifecycle` for the merge order).
#[derive(Debug, Clone)]
pub struct Config {
    pub daemonize: bool,
    pub debug: bool,
    pub children_max: u32,
    pub exec_delay: Duration,
    pub event_timeout: Duration,
    pub resolve_names: ResolveNameTiming,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemonize: false,
            debug: false,
            children_max: default_children_max(num_cpus_fallback(), 1 << 30),
            exec_delay: Duration::ZERO,
            event_timeout: DEFAULT_EVENT_TIMEOUT,
            resolve_names: ResolveNameTiming::default(),
        }
    }
}

/// A conservative CPU-count fallback for contexts that can't query the host
/// (e.g. unit tests). Real startup uses `std::thread::available_parallelism`.
fn num_cpus_fallback() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_children_max_applies_formula() {
        assert_eq!(default_children_max(4, 64 * CHILDREN_MAX_MEMORY_DIVISOR), 40);
    }

    #[test]
    fn default_children_max_floors_at_ten() {
        assert_eq!(default_children_max(0, 1024), CHILDREN_MAX_FLOOR);
    }

    #[test]
    fn default_children_max_is_memory_clamped() {
        // 8 + 8*64 = 520, but only 20 * 128MiB of memory is available —
        // above the floor, so the memory ceiling wins over the CPU formula.
        assert_eq!(default_children_max(64, 20 * CHILDREN_MAX_MEMORY_DIVISOR), 20);
    }

    #[test]
    fn resolve_name_timing_parses_known_values() {
        assert_eq!(ResolveNameTiming::parse("early"), Some(ResolveNameTiming::Early));
        assert_eq!(ResolveNameTiming::parse("late"), Some(ResolveNameTiming::Late));
        assert_eq!(ResolveNameTiming::parse("never"), Some(ResolveNameTiming::Never));
        assert_eq!(ResolveNameTiming::parse("bogus"), None);
    }
}
