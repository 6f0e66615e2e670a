// SPDX-License-Identifier: MIT

//! `SET_LOG_LEVEL` (§4.6) as a live filter reload, on top of the
//! `tracing_subscriber::reload` layer `main.rs` installs at startup. The
//! spec also requires SIGTERMing every worker so respawned children
//! inherit the new level via environment (§4.6) — that half is the
//! reactor's job; this module only owns the filter handle.

use tracing_subscriber::{reload, EnvFilter, Registry};

/// Handle to the live `EnvFilter` layer, set up once in `main.rs` and
/// handed to the reactor so `SET_LOG_LEVEL` can swap it without
/// restarting the process. `Registry` is the base subscriber the filter
/// layer sits directly on, per `main.rs`'s `registry().with(filter).with(fmt_layer)`
/// construction.
pub struct LogController {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LogController {
    pub fn new(handle: reload::Handle<EnvFilter, Registry>) -> Self {
        Self { handle }
    }

    /// Apply a syslog-style priority (0 = emerg .. 7 = debug), the same
    /// numeric scale `udev.log_priority=` and `-D/--debug` map onto.
    pub fn set_level(&self, level: u8) {
        let directive = level_to_filter(level);
        if let Err(e) = self.handle.modify(|filter| *filter = EnvFilter::new(directive)) {
            tracing::warn!(error = %e, level, "failed to reload log filter");
        }
    }
}

fn level_to_filter(level: u8) -> &'static str {
    match level {
        0..=3 => "error",
        4 => "warn",
        5..=6 => "info",
        _ => "debug",
    }
}
