//! Guarded removal of fetched segment files.

use std::path::{Component, Path, PathBuf};

use crate::collab::TempFileCleaner;
use crate::config::AssemblerConfig;

/// Deletes only files that sit directly in the configured temp directory and whose
/// name carries the temp-file marker. Any other path is skipped and logged.
#[derive(Debug, Clone)]
pub struct GuardedCleaner {
    temp_dir: PathBuf,
    marker: String,
}

impl GuardedCleaner {
    pub fn new(config: &AssemblerConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone(),
            marker: config.temp_file_marker.clone(),
        }
    }

    /// Whether `path` may be deleted.
    pub fn is_temp_file(&self, path: &Path) -> bool {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return false;
        }
        let in_temp_dir = path.parent() == Some(self.temp_dir.as_path());
        let marked = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(&self.marker));
        in_temp_dir && marked
    }

    /// Remove every eligible path, returning how many were deleted.
    pub fn remove(&self, paths: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in paths {
            if !self.is_temp_file(path) {
                tracing::warn!(
                    path = %path.display(),
                    temp_dir = %self.temp_dir.display(),
                    "refusing to delete a file that is not a temp segment"
                );
                continue;
            }
            match std::fs::remove_file(path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(path = %path.display(), "failed to remove temp file: {e}"),
            }
        }
        tracing::info!(removed, requested = paths.len(), "temp files cleared");
        removed
    }
}

impl TempFileCleaner for GuardedCleaner {
    fn remove_temp_files(&self, paths: &[PathBuf]) {
        self.remove(paths);
    }
}
