// SPDX-License-Identifier: MIT

//! Real `QueueMarker`: the `/run/udev/queue` presence file (§5), touched
//! and unlinked with best-effort semantics — failures are logged, never
//! fatal (§7).

use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::warn;
use ueventd_engine::error::QueueError;
use ueventd_engine::ports::QueueMarker;

pub struct FileQueueMarker {
    path: PathBuf,
}

impl FileQueueMarker {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl QueueMarker for FileQueueMarker {
    fn touch(&self) -> Result<(), QueueError> {
        OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.path)
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, path = %self.path.display(), "failed to touch queue marker");
                QueueError::MarkerCreate(e.to_string())
            })
    }

    fn remove(&self) -> Result<(), QueueError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "failed to remove queue marker");
                Err(QueueError::MarkerRemove(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_then_remove_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let marker = FileQueueMarker::new(dir.path().join("queue"));
        marker.touch().unwrap();
        assert!(dir.path().join("queue").exists());
        marker.remove().unwrap();
        assert!(!dir.path().join("queue").exists());
    }

    #[test]
    fn remove_of_absent_marker_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let marker = FileQueueMarker::new(dir.path().join("queue"));
        marker.remove().unwrap();
    }
}
