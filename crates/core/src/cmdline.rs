// SPDX-License-Identifier: MIT

//! Parsing for the `udev.*` kernel-command-line overrides (§6).
//!
//! Unknown `udev.*` keys are logged and ignored by the caller; malformed
//! values are warned and ignored. This module reports both cases back to
//! the caller (as `Ok(None)` / an error) rather than logging itself, since
//! it has no I/O dependency — `ueventd-daemon` does the logging.

use crate::error::CoreError;

/// One recognized `udev.*` kernel-command-line override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdlineOverride {
    LogPriority(u8),
    ChildrenMax(u32),
    ExecDelaySecs(u32),
    EventTimeoutSecs(u32),
}

/// Parse one `key=value` kernel-command-line token (the `udev.` prefix
/// already stripped). Returns `Ok(None)` for a key this daemon does not
/// recognize — the caller logs and ignores it, per §6.
pub fn parse_token(key: &str, value: &str) -> Result<Option<CmdlineOverride>, CoreError> {
    let parsed_u32 = || {
        value
            .parse::<u32>()
            .map_err(|_| CoreError::MalformedCmdlineValue {
                key: key.to_string(),
                value: value.to_string(),
            })
    };

    match key {
        "log_priority" => {
            let n: u8 = value.parse().map_err(|_| CoreError::MalformedCmdlineValue {
                key: key.to_string(),
                value: value.to_string(),
            })?;
            Ok(Some(CmdlineOverride::LogPriority(n)))
        }
        "children_max" => Ok(Some(CmdlineOverride::ChildrenMax(parsed_u32()?))),
        "exec_delay" => Ok(Some(CmdlineOverride::ExecDelaySecs(parsed_u32()?))),
        "event_timeout" => Ok(Some(CmdlineOverride::EventTimeoutSecs(parsed_u32()?))),
        _ => Ok(None),
    }
}

/// Parse a full kernel command line (space-separated tokens), keeping only
/// `udev.*` entries and silently skipping every other token (the rest of
/// the command line is not this daemon's business).
///
/// Returns the overrides that parsed successfully, plus the raw
/// `(key, value)` pairs that were `udev.*` but either unrecognized or
/// malformed, so the caller can log each at the right level.
pub fn parse_cmdline(cmdline: &str) -> (Vec<CmdlineOverride>, Vec<(String, String)>) {
    let mut overrides = Vec::new();
    let mut rejected = Vec::new();

    for token in cmdline.split_whitespace() {
        let Some(rest) = token.strip_prefix("udev.") else {
            continue;
        };
        let Some((key, value)) = rest.split_once('=') else {
            rejected.push((rest.to_string(), String::new()));
            continue;
        };
        match parse_token(key, value) {
            Ok(Some(o)) => overrides.push(o),
            Ok(None) => rejected.push((key.to_string(), value.to_string())),
            Err(_) => rejected.push((key.to_string(), value.to_string())),
        }
    }

    (overrides, rejected)
}
