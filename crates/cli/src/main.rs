// SPDX-License-Identifier: MIT

//! `ueventadm`: a thin client over the control socket (§4.6), the
//! counterpart to the real `udevadm control` subcommand. Connects, sends
//! one batch of [`ControlRequest`]s, prints the [`ControlResponse`], exits
//! non-zero on any transport or daemon-reported error.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::UnixStream;

use ueventd_core::protocol::{ControlRequest, ControlResponse};
use ueventd_daemon::protocol_wire::{self, ProtocolError, DEFAULT_TIMEOUT};

#[derive(Parser, Debug)]
#[command(name = "ueventadm", version, about = "control client for ueventd")]
struct Cli {
    /// Path to the control socket (defaults to `$UEVENTD_STATE_DIR` or
    /// `/run/udev`'s `ueventd-ctrl.sock`, matching the daemon's own layout).
    #[arg(long = "socket", global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reload rules and builtins, SIGTERMing all workers.
    Reload,
    /// Check that the daemon is alive and responsive.
    Ping,
    /// Pause dispatching (queued events stay queued).
    StopExecQueue,
    /// Resume dispatching.
    StartExecQueue,
    /// Set the logger's verbosity (0=emerg .. 7=debug), SIGTERMing workers
    /// so respawned children inherit it.
    LogPriority {
        #[arg(value_name = "LEVEL")]
        level: u8,
    },
    /// Set the maximum number of concurrent worker processes.
    ChildrenMax {
        #[arg(value_name = "N")]
        n: u32,
    },
    /// Upsert or unset a dynamic environment property passed to every
    /// worker (`KEY=VALUE` to set, `KEY=` to unset for children).
    Property {
        #[arg(value_name = "KEY=VALUE")]
        assignment: String,
    },
    /// Begin a graceful shutdown and wait for it to complete.
    Exit,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("ueventadm: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let socket_path = cli.socket.unwrap_or_else(default_socket_path);

    let op = match cli.command {
        Command::Reload => ControlRequest::Reload,
        Command::Ping => ControlRequest::Ping,
        Command::StopExecQueue => ControlRequest::StopExecQueue,
        Command::StartExecQueue => ControlRequest::StartExecQueue,
        Command::LogPriority { level } => ControlRequest::SetLogLevel(level),
        Command::ChildrenMax { n } => ControlRequest::SetChildrenMax(n),
        Command::Property { assignment } => ControlRequest::parse_env_assignment(&assignment)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?,
        Command::Exit => ControlRequest::Exit,
    };

    let response = send(&socket_path, vec![op]).await?;
    match response {
        ControlResponse::Ok | ControlResponse::ExitAcknowledged => Ok(()),
        ControlResponse::Pong => {
            println!("pong");
            Ok(())
        }
        ControlResponse::Error { message } => Err(CliError::Rejected(message)),
    }
}

async fn send(socket_path: &std::path::Path, ops: Vec<ControlRequest>) -> Result<ControlResponse, CliError> {
    let stream = UnixStream::connect(socket_path)
        .await
        .map_err(|e| CliError::Connect(socket_path.display().to_string(), e))?;
    let (mut reader, mut writer) = stream.into_split();

    let payload = protocol_wire::encode(&ops)?;
    protocol_wire::write_message(&mut writer, &payload).await?;

    // EXIT deliberately holds the connection open on the daemon side until
    // shutdown completes (§4.6), which may take up to the 30s exit
    // deadline — so no read timeout is applied here beyond the protocol's
    // own default.
    let timeout = if ops.iter().any(|o| matches!(o, ControlRequest::Exit)) {
        std::time::Duration::from_secs(35)
    } else {
        DEFAULT_TIMEOUT
    };
    let bytes = tokio::time::timeout(timeout, protocol_wire::read_message(&mut reader))
        .await
        .map_err(|_| CliError::Protocol(ProtocolError::Timeout))??;
    Ok(protocol_wire::decode(&bytes)?)
}

fn default_socket_path() -> PathBuf {
    let state_dir = std::env::var("UEVENTD_STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/run/udev"));
    state_dir.join("ueventd-ctrl.sock")
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not connect to {0}: {1}")]
    Connect(String, #[source] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("daemon rejected request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_socket_path_honors_state_dir_override() {
        std::env::set_var("UEVENTD_STATE_DIR", "/tmp/ueventd-test-state");
        assert_eq!(
            default_socket_path(),
            PathBuf::from("/tmp/ueventd-test-state/ueventd-ctrl.sock")
        );
        std::env::remove_var("UEVENTD_STATE_DIR");
    }
}
