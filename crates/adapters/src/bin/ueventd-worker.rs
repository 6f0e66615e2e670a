// SPDX-License-Identifier: MIT

//! Entry point for the worker process `ueventd-daemon` execs per §4.5
//! "Spawning". Not meant to be invoked directly — `RealWorkerSpawner` is
//! the only caller, and it supplies the initial device and ack socket
//! path via environment variables plus the worker's own receiving
//! endpoint as `argv[1]`.

use std::path::PathBuf;

use ueventd_adapters::worker_main::{self, NoopRuleEngine};
use ueventd_core::Device;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(endpoint_arg) = std::env::args().nth(1) else {
        eprintln!("usage: ueventd-worker <endpoint-socket-path>");
        std::process::exit(2);
    };
    let endpoint_path = PathBuf::from(endpoint_arg);

    let Ok(ack_socket) = std::env::var("UEVENTD_ACK_SOCKET") else {
        eprintln!("UEVENTD_ACK_SOCKET not set");
        std::process::exit(2);
    };
    let ack_socket_path = PathBuf::from(ack_socket);

    let Ok(initial_json) = std::env::var("UEVENTD_WORKER_INITIAL_DEVICE") else {
        eprintln!("UEVENTD_WORKER_INITIAL_DEVICE not set");
        std::process::exit(2);
    };
    let initial: Device = match serde_json::from_str(&initial_json) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("malformed initial device: {e}");
            std::process::exit(2);
        }
    };

    let rule_engine = NoopRuleEngine;
    if let Err(e) = worker_main::run(endpoint_path, ack_socket_path, initial, &rule_engine).await {
        eprintln!("worker exited with error: {e}");
        std::process::exit(1);
    }
}
