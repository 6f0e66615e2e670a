// SPDX-License-Identifier: MIT

//! `ueventd`: entry point. Parses the CLI flags and `udev.*` kernel-command-
//! line overrides §6 names, sets up logging, wires every adapter via
//! [`ueventd_daemon::lifecycle::startup`], and drives the reactor to
//! completion.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use ueventd_daemon::config::{CliOverrides, Paths};
use ueventd_daemon::{lifecycle, reactor, LogController};
use ueventd_core::config::ResolveNameTiming;

/// `ueventd` CLI flags (§6): `-d` run in background, `-D` debug (stay in the
/// foreground, log to stderr at debug level), `-c` worker cap, `-e`
/// exec-delay seconds, `-t` event-timeout seconds, `-N` name-resolution
/// timing.
#[derive(Parser, Debug)]
#[command(name = "ueventd", version, about = "device event dispatch daemon")]
struct Cli {
    /// Detach and run in the background (daemonize).
    #[arg(short = 'd', long = "daemon")]
    daemon: bool,

    /// Run in the foreground with debug-level logging to stderr.
    #[arg(short = 'D', long = "debug")]
    debug: bool,

    /// Maximum number of concurrent worker processes.
    #[arg(short = 'c', long = "children-max", value_name = "N")]
    children_max: Option<u32>,

    /// Delay, in seconds, before running a device's rules.
    #[arg(short = 'e', long = "exec-delay", value_name = "SECONDS")]
    exec_delay: Option<u32>,

    /// Kill a worker that has not acknowledged its event within this many
    /// seconds.
    #[arg(short = 't', long = "event-timeout", value_name = "SECONDS")]
    event_timeout: Option<u32>,

    /// When to resolve user/group names to numeric ids: early, late, never.
    #[arg(short = 'N', long = "resolve-names", value_name = "WHEN")]
    resolve_names: Option<String>,
}

impl Cli {
    fn into_overrides(self) -> Result<CliOverrides, String> {
        let resolve_names = match self.resolve_names {
            Some(ref s) => {
                Some(ResolveNameTiming::parse(s).ok_or_else(|| format!("invalid -N value: {s}"))?)
            }
            None => None,
        };
        Ok(CliOverrides {
            daemonize: if self.daemon { Some(true) } else { None },
            debug: if self.debug { Some(true) } else { None },
            children_max: self.children_max,
            exec_delay_secs: self.exec_delay,
            event_timeout_secs: self.event_timeout,
            resolve_names,
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;
    let overrides = match cli.into_overrides() {
        Ok(o) => o,
        Err(e) => {
            eprintln!("ueventd: {e}");
            std::process::exit(1);
        }
    };

    let log_controller = match setup_logging(debug) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ueventd: failed to set up logging: {e}");
            std::process::exit(1);
        }
    };

    // Daemonization (detaching from the controlling terminal) is an
    // external collaborator per spec.md §1 ("CLI parsing, daemonization ...
    // remain external collaborators") and is deliberately not implemented
    // here: double-forking a process that has already initialized a tokio
    // multi-threaded runtime is unsound (see DESIGN.md). `-d` is accepted
    // and otherwise ignored so scripts invoking the real `ueventd -d` do
    // not fail to parse.
    if overrides.daemonize == Some(true) {
        tracing::warn!("-d/--daemon requested but daemonization is not implemented; running in the foreground");
    }

    let config = ueventd_daemon::config::build_core_config(&overrides);

    let paths = match Paths::load() {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve state directory");
            std::process::exit(1);
        }
    };

    let daemon = match lifecycle::startup(&paths, &config).await {
        Ok(d) => d,
        Err(e) => {
            tracing::error!(error = %e, "failed to start ueventd");
            std::process::exit(1);
        }
    };

    let outcome = reactor::run(daemon, log_controller).await;
    match outcome {
        reactor::ExitOutcome::Clean => std::process::exit(0),
        // §7 "Exit deadline expired: the loop terminates with ETIMEDOUT; the
        // process exits non-zero."
        reactor::ExitOutcome::TimedOut => std::process::exit(libc::ETIMEDOUT),
    }
}

/// Build the `tracing_subscriber` registry with a reloadable `EnvFilter`
/// layer (so `SET_LOG_LEVEL` can change verbosity without a restart) over a
/// plain `fmt` layer to stderr. `-D/--debug` seeds the filter at `debug`;
/// otherwise `info`, both overridable by `RUST_LOG`.
fn setup_logging(debug: bool) -> Result<LogController, reload::Error> {
    let default_directive = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let (filter, handle) = reload::Layer::new(filter);

    let registry: Registry = tracing_subscriber::registry();
    registry.with(filter).with(fmt::layer().with_writer(std::io::stderr)).init();

    Ok(LogController::new(handle))
}
