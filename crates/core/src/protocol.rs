// SPDX-License-Identifier: MIT

//! Control-socket request/response shapes (§4.6). The wire codec itself
//! (length-prefixed JSON over `SOCK_SEQPACKET`) lives in
//! `ueventd-daemon::protocol_wire`; this module only pins down the typed
//! payload both ends agree on.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One control operation, as accepted by §4.6. A single control message may
/// carry several of these (e.g. `SET_ENV "FOO=bar"` followed by
/// `SET_LOG_LEVEL(7)` in the same connection) — the daemon applies each
/// sequentially and reports on the first failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlRequest {
    SetLogLevel(u8),
    StopExecQueue,
    StartExecQueue,
    Reload,
    /// `SET_ENV "k=v"` or `SET_ENV "k="`. The parsed (key, value) pair: a
    /// `None` value means "unset for children" per §4.6.
    SetEnv { key: String, value: Option<String> },
    SetChildrenMax(u32),
    Ping,
    Exit,
}

impl ControlRequest {
    /// Parse a `SET_ENV` argument of the form `"KEY=VALUE"` or `"KEY="`.
    /// `"KEY"` with no `=` at all is invalid per §4.6 ("Invalid env strings
    /// (no `=`) are reported and ignored").
    pub fn parse_env_assignment(raw: &str) -> Result<ControlRequest, CoreError> {
        let (key, value) = raw
            .split_once('=')
            .ok_or_else(|| CoreError::MalformedEnvAssignment(raw.to_string()))?;
        if key.is_empty() {
            return Err(CoreError::MalformedEnvAssignment(raw.to_string()));
        }
        let value = if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        };
        Ok(ControlRequest::SetEnv {
            key: key.to_string(),
            value,
        })
    }
}

/// Response to a single [`ControlRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponse {
    Ok,
    Pong,
    /// `EXIT` holds the connection open until shutdown completes, per
    /// §4.6 ("hold the originating connection open as an acknowledgment").
    ExitAcknowledged,
    Error { message: String },
}
