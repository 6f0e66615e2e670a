// SPDX-License-Identifier: MIT

//! Real inotify watch registry (§4.7): watches device nodes for
//! `IN_CLOSE_WRITE` (feeding the synthesizer) and `IN_IGNORED`
//! (unregistering a watch whose target disappeared). The watch-descriptor
//! to device map itself is the "external" persistence spec.md's §1 scope
//! note mentions; this adapter keeps it in memory and restores it from the
//! device database at startup (`ueventd-daemon::lifecycle`'s job).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use inotify::{EventMask, Inotify, WatchDescriptor, Watches};
pub use inotify::WatchMask;
use tokio_stream::StreamExt;
use tracing::warn;

use ueventd_engine::synth::WatchedDevice;

use crate::error::AdapterError;

/// One decoded inotify outcome, routed by the daemon's reactor to either
/// the synthesizer (`CloseWrite`) or the registry's own unregister path
/// (`Ignored`) — mirrors §4.7: "on `IN_CLOSE_WRITE` ... call the
/// synthesizer; on `IN_IGNORED`, unregister the watch (external)".
pub enum InotifyOutcome {
    CloseWrite(WatchedDevice),
    Ignored(WatchDescriptor),
}

pub struct InotifyRegistry {
    /// Handle for adding/removing watches; independent of the event
    /// stream below, so both can be used concurrently.
    handle: Watches,
    stream: Mutex<inotify::EventStream<[u8; 4096]>>,
    watches: Mutex<HashMap<WatchDescriptor, WatchedDevice>>,
}

impl InotifyRegistry {
    pub fn new() -> Result<Self, AdapterError> {
        let inotify = Inotify::init()?;
        let handle = inotify.watches();
        let stream = inotify.into_event_stream([0u8; 4096])?;
        Ok(Self {
            handle,
            stream: Mutex::new(stream),
            watches: Mutex::new(HashMap::new()),
        })
    }

    /// Register a close-write watch on `devnode`, recording `dev` so a
    /// later `IN_CLOSE_WRITE` can be turned back into the synthesizer's
    /// [`WatchedDevice`] view.
    pub fn add_watch(&self, devnode: &str, dev: WatchedDevice) -> Result<WatchDescriptor, AdapterError> {
        let wd = self.handle.add(Path::new(devnode), WatchMask::CLOSE_WRITE)?;
        self.watches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(wd.clone(), dev);
        Ok(wd)
    }

    /// Drop a watch's device record (§4.7: "unregister the watch" on
    /// `IN_IGNORED`). The kernel has already torn down the watch itself by
    /// the time `IN_IGNORED` arrives; this only frees our side-table entry.
    pub fn forget(&self, wd: &WatchDescriptor) {
        self.watches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(wd);
    }

    /// Await and classify the next inotify event (§4.1: "inotify fd
    /// (readable) — default priority"). Returns `None` only if the
    /// underlying stream has ended (the inotify fd was closed).
    pub async fn next_outcome(&self) -> Option<InotifyOutcome> {
        loop {
            let event = {
                let mut stream = self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                stream.next().await?
            };
            let event = match event {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "inotify stream read failed");
                    continue;
                }
            };

            if event.mask.contains(EventMask::IGNORED) {
                return Some(InotifyOutcome::Ignored(event.wd));
            }
            if event.mask.contains(EventMask::CLOSE_WRITE) {
                let watches = self.watches.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                if let Some(dev) = watches.get(&event.wd) {
                    return Some(InotifyOutcome::CloseWrite(dev.clone()));
                }
            }
            // Any other mask (we only ever request CLOSE_WRITE) is ignored.
        }
    }
}
