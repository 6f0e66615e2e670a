// SPDX-License-Identifier: MIT

//! Parse/decode errors surfaced by pure data-model code in this crate.
//!
//! Everything else in §7's taxonomy (transient I/O, dispatch-send failure,
//! abnormal worker exit, queue-marker I/O) belongs to crates that actually
//! touch a socket or a process, so it lives in `ueventd-engine`/
//! `ueventd-adapters` instead.

use thiserror::Error;

/// Errors raised while parsing kernel-command-line overrides or decoding the
/// control-socket wire protocol — the two places this crate turns untrusted
/// bytes/strings into typed values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed udev.{key} value {value:?}")]
    MalformedCmdlineValue { key: String, value: String },

    #[error("malformed SET_ENV argument {0:?}: missing '='")]
    MalformedEnvAssignment(String),

    #[error("invalid log level {0}")]
    InvalidLogLevel(i64),
}
