// SPDX-License-Identifier: MIT

//! Real `RulesFreshness` (§4.5 step 2): compares the newest mtime under the
//! rules directories plus the builtin-version file against the snapshot
//! taken the last time the rules database was (re)built.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::SystemTime;

use tracing::warn;

use ueventd_engine::ports::RulesFreshness;

pub struct MtimeRulesFreshness {
    rules_dirs: Vec<PathBuf>,
    builtin_version_file: Option<PathBuf>,
    snapshot: Mutex<Option<SystemTime>>,
    built: Mutex<bool>,
}

impl MtimeRulesFreshness {
    pub fn new(rules_dirs: Vec<PathBuf>, builtin_version_file: Option<PathBuf>) -> Self {
        Self {
            rules_dirs,
            builtin_version_file,
            snapshot: Mutex::new(None),
            built: Mutex::new(false),
        }
    }

    fn newest_mtime(&self) -> Option<SystemTime> {
        let mut newest: Option<SystemTime> = None;
        let mut consider = |path: &std::path::Path| {
            if let Ok(meta) = std::fs::metadata(path) {
                if let Ok(modified) = meta.modified() {
                    newest = Some(newest.map_or(modified, |n| n.max(modified)));
                }
            }
        };

        for dir in &self.rules_dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.filter_map(|e| e.ok()) {
                consider(&entry.path());
            }
        }
        if let Some(version_file) = &self.builtin_version_file {
            consider(version_file);
        }
        newest
    }
}

impl RulesFreshness for MtimeRulesFreshness {
    fn is_stale(&self) -> bool {
        let current = self.newest_mtime();
        let snapshot = *self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match (snapshot, current) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(old), Some(new)) => new > old,
        }
    }

    fn mark_fresh(&self) {
        let current = self.newest_mtime();
        if current.is_none() {
            warn!("rules freshness check found no rule files; marking fresh anyway");
        }
        *self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = current;
        *self.built.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = true;
    }

    fn invalidate(&self) {
        *self.built.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = false;
    }

    fn is_built(&self) -> bool {
        *self.built.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_after_mark_fresh_until_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("50-default.rules"), "# rule\n").unwrap();

        let freshness = MtimeRulesFreshness::new(vec![dir.path().to_path_buf()], None);
        assert!(freshness.is_stale());
        freshness.mark_fresh();
        assert!(!freshness.is_stale());
        assert!(freshness.is_built());

        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(dir.path().join("60-custom.rules"), "# new rule\n").unwrap();
        assert!(freshness.is_stale());
    }

    #[test]
    fn invalidate_clears_built_flag_but_not_staleness_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("50-default.rules"), "# rule\n").unwrap();
        let freshness = MtimeRulesFreshness::new(vec![dir.path().to_path_buf()], None);
        freshness.mark_fresh();
        freshness.invalidate();
        assert!(!freshness.is_built());
        assert!(!freshness.is_stale());
    }
}
