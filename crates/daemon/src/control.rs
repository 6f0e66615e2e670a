// SPDX-License-Identifier: MIT

//! Control socket accept loop (C6, §4.6). Runs at the reactor's lowest
//! ("idle") priority by construction: every accepted connection hands its
//! request batch to the reactor over an `mpsc` channel and waits for a
//! reply on a paired `oneshot`, so manager mutation stays on the single
//! reactor thread no matter how many clients connect concurrently.

use std::sync::Arc;

use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use ueventd_core::protocol::{ControlRequest, ControlResponse};

use crate::protocol_wire::{self, ProtocolError, DEFAULT_TIMEOUT};

/// One client request batch plus where to send the eventual response.
/// `EXIT` holds the connection open until shutdown completes (§4.6) by
/// the reactor simply not sending on `reply` until the manager is
/// quiescent — see `reactor::apply_control_batch`.
pub struct ControlMessage {
    pub ops: Vec<ControlRequest>,
    pub reply: oneshot::Sender<ControlResponse>,
}

/// Accept loop: one spawned task per connection, each forwarding exactly
/// one request batch into `tx` and writing back whatever the reactor
/// eventually sends on the paired oneshot.
pub async fn run(listener: Arc<UnixListener>, tx: mpsc::Sender<ControlMessage>) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "control socket accept failed");
                continue;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &tx).await {
                match e {
                    ProtocolError::ConnectionClosed => debug!("control client disconnected"),
                    ProtocolError::Timeout => warn!("control connection timed out"),
                    e => warn!(error = %e, "control connection error"),
                }
            }
        });
    }
}

async fn handle_connection(stream: UnixStream, tx: &mpsc::Sender<ControlMessage>) -> Result<(), ProtocolError> {
    let (mut reader, mut writer) = stream.into_split();
    let ops = protocol_wire::read_request(&mut reader, DEFAULT_TIMEOUT).await?;
    debug!(ops = ?ops, "received control request batch");

    let (reply_tx, reply_rx) = oneshot::channel();
    if tx.send(ControlMessage { ops, reply: reply_tx }).await.is_err() {
        return protocol_wire::write_response(
            &mut writer,
            &ControlResponse::Error {
                message: "reactor shut down".into(),
            },
            DEFAULT_TIMEOUT,
        )
        .await;
    }

    // No timeout here: `EXIT` deliberately holds this open until shutdown
    // completes, which may take up to the §4.8 30s exit deadline.
    let response = reply_rx.await.unwrap_or(ControlResponse::Error {
        message: "reactor dropped the reply channel".into(),
    });
    protocol_wire::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await
}
