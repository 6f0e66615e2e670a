// SPDX-License-Identifier: MIT

//! Adapter-level I/O errors (§7: transient I/O, malformed ack, dispatch
//! send failure are surfaced through these; the engine-level error enums
//! classify what to *do* about them).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nix error: {0}")]
    Nix(#[from] nix::Error),

    #[error("ack message had wrong size: got {got}, want {want}")]
    MalformedAck { got: usize, want: usize },

    #[error("ack sender credentials missing or unverifiable")]
    MissingCredentials,

    #[error("ack sender pid {0} is not a tracked worker")]
    UntrackedSender(i32),

    #[error("worker process failed to start: {0}")]
    SpawnFailed(String),
}
