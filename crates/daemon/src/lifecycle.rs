// SPDX-License-Identifier: MIT

//! Startup wiring and shutdown (C8, §4.8): acquires the daemon's
//! single-instance lock, constructs every port adapter, and binds sockets
//! last so a partially-initialized daemon never appears live to clients.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use ueventd_adapters::{
    AdapterError, FileQueueMarker, InotifyRegistry, MtimeRulesFreshness, RealAckReceiver, RealDeviceFs,
    RealMonitorPublisher, RealUeventSource, RealWorkerSpawner,
};
use ueventd_core::config::Config as CoreConfig;
use ueventd_engine::manager::Manager;

use crate::config::Paths;
use crate::{env, notify};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Every port adapter plus the manager and control-socket listener the
/// reactor needs. Built once at startup, handed to
/// [`crate::reactor::run`] by value.
pub struct Daemon {
    pub manager: Manager,
    pub paths: Paths,
    pub uevent_source: RealUeventSource,
    pub ack_receiver: RealAckReceiver,
    pub monitor_publisher: RealMonitorPublisher,
    pub worker_spawner: RealWorkerSpawner,
    pub queue_marker: FileQueueMarker,
    pub rules_freshness: MtimeRulesFreshness,
    pub device_fs: RealDeviceFs,
    pub inotify: InotifyRegistry,
    /// Shared so the reactor can hand a clone to the accept-loop task it
    /// spawns while still holding `Daemon` whole for the rest of its life.
    pub control_listener: Arc<UnixListener>,
    // Held for the process lifetime solely to keep the advisory lock;
    // never read again after startup.
    #[allow(dead_code)]
    lock_file: File,
}

/// Acquire the lock and wire every adapter (§4.8 "Startup"). On failure,
/// removes whatever this attempt created — except when the failure was
/// `LockFailed`, since those paths belong to the daemon already running.
pub async fn startup(paths: &Paths, config: &CoreConfig) -> Result<Daemon, LifecycleError> {
    match startup_inner(paths, config).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(paths);
            }
            Err(e)
        }
    }
}

async fn startup_inner(paths: &Paths, config: &CoreConfig) -> Result<Daemon, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;
    std::fs::create_dir_all(&paths.worker_endpoint_dir)?;

    // Lock file first, before anything else touches the state dir, so a
    // second instance fails fast instead of racing socket binds.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.lock_file)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let worker_spawner = RealWorkerSpawner::new(
        paths.worker_bin.clone(),
        paths.worker_endpoint_dir.clone(),
        paths.worker_ack_socket.clone(),
    );
    let queue_marker = FileQueueMarker::new(paths.queue_marker.clone());
    let rules_freshness = MtimeRulesFreshness::new(env::rules_dirs(), env::builtin_version_file());
    let device_fs = RealDeviceFs;
    let inotify = InotifyRegistry::new()?;
    let monitor_publisher = RealMonitorPublisher::new(paths.subscriber_socket.display().to_string());

    let ack_receiver = RealAckReceiver::bind(&paths.worker_ack_socket)?;
    let uevent_source = RealUeventSource::bind(&paths.uevent_socket)?;

    // Control socket bound last: only after every other adapter is live
    // does the daemon look up and ready to a connecting client.
    let _ = std::fs::remove_file(&paths.control_socket);
    let control_listener = Arc::new(
        UnixListener::bind(&paths.control_socket)
            .map_err(|e| LifecycleError::BindFailed(paths.control_socket.clone(), e))?,
    );

    let manager = Manager::new(
        std::process::id() as i32,
        config.children_max,
        config.event_timeout.as_micros() as u64,
    );

    info!(
        state_dir = %paths.state_dir.display(),
        children_max = config.children_max,
        "ueventd started"
    );

    Ok(Daemon {
        manager,
        paths: paths.clone(),
        uevent_source,
        ack_receiver,
        monitor_publisher,
        worker_spawner,
        queue_marker,
        rules_freshness,
        device_fs,
        inotify,
        control_listener,
        lock_file,
    })
}

fn cleanup_on_failure(paths: &Paths) {
    let _ = std::fs::remove_file(&paths.control_socket);
    let _ = std::fs::remove_file(&paths.uevent_socket);
    let _ = std::fs::remove_file(&paths.worker_ack_socket);
}

impl Daemon {
    /// §4.8 graceful shutdown's filesystem half: the manager-state half
    /// (`exit` flag, dropping queued events, SIGTERMing workers) is
    /// [`Manager::begin_graceful_shutdown`], already applied by the
    /// reactor before this runs.
    pub fn shutdown(&self) {
        notify::stopping();
        for path in [
            &self.paths.control_socket,
            &self.paths.uevent_socket,
            &self.paths.worker_ack_socket,
            &self.paths.queue_marker,
            &self.paths.lock_file,
        ] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(error = %e, path = %path.display(), "failed to remove file on shutdown");
                }
            }
        }
        info!("ueventd shutdown complete");
    }
}
