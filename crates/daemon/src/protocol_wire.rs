// SPDX-License-Identifier: MIT

//! Wire format for the control socket (§4.6): 4-byte big-endian length
//! prefix + JSON payload. A single message carries `Vec<ControlRequest>` —
//! §4.6 allows several ops per connection (e.g. `SET_ENV` followed by
//! `SET_LOG_LEVEL` in the same message) — and gets back one
//! [`ControlResponse`] reporting the first failure, or `Ok`/`Pong` if every
//! op succeeded.
//!
//! `SOCK_SEQPACKET` is what spec.md's control socket literally is; tokio has
//! no `SOCK_SEQPACKET` listener, so this substitutes a `SOCK_STREAM`
//! connection with this length-prefixed framing — see DESIGN.md.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use ueventd_core::protocol::ControlResponse;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// Control messages are tiny (a handful of ops); this is a generous ceiling
/// against a misbehaving client, not a real working limit.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Encode a message to JSON bytes (without the length prefix).
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    let json = serde_json::to_vec(msg)?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: json.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(json)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message from an async reader.
pub async fn read_message<R: tokio::io::AsyncReadExt + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(ProtocolError::ConnectionClosed),
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one length-prefixed message to an async writer.
pub async fn write_message<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    let len = data.len();
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge { size: len, max: MAX_MESSAGE_SIZE });
    }
    writer.write_all(&(len as u32).to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a batch of control requests with a timeout.
pub async fn read_request<R: tokio::io::AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<Vec<ueventd_core::protocol::ControlRequest>, ProtocolError> {
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Write a response with a timeout.
pub async fn write_response<W: tokio::io::AsyncWriteExt + Unpin>(
    writer: &mut W,
    response: &ControlResponse,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use ueventd_core::protocol::ControlRequest;

    #[tokio::test]
    async fn round_trips_a_request_batch() {
        let batch = vec![ControlRequest::Ping, ControlRequest::SetLogLevel(7)];
        let data = encode(&batch).unwrap();
        let mut cursor = std::io::Cursor::new(Vec::new());
        write_message(&mut cursor, &data).await.unwrap();

        let mut read_cursor = std::io::Cursor::new(cursor.into_inner());
        let decoded_bytes = read_message(&mut read_cursor).await.unwrap();
        let decoded: Vec<ControlRequest> = decode(&decoded_bytes).unwrap();
        assert_eq!(decoded, batch);
    }

    #[tokio::test]
    async fn read_message_on_closed_stream_is_connection_closed() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let mut cursor = std::io::Cursor::new((MAX_MESSAGE_SIZE as u32 + 1).to_be_bytes().to_vec());
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProtocolError::MessageTooLarge { .. })
        ));
    }
}
