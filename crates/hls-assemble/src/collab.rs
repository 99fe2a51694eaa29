//! Narrow contracts the assembler uses to reach the network, disk and media tooling.
//!
//! Each trait is implemented for matching closures, so tests and small callers can
//! pass a `|uri| ...` instead of a dedicated type.

use std::path::{Path, PathBuf};

use crate::error::TransportError;

/// Returns raw playlist text for a (relative or absolute) playlist reference.
pub trait PlaylistSource {
    fn fetch_playlist_text(&self, reference: &str) -> Result<String, TransportError>;
}

/// Downloads one segment into the temp directory and returns its local path.
/// Called from worker threads when fetching concurrently.
pub trait SegmentFetcher: Sync {
    fn fetch_segment_to_path(&self, uri: &str) -> Result<PathBuf, TransportError>;
}

/// Concatenates segment files, in the given order, into a single container.
pub trait SegmentMerger {
    fn merge_segments(
        &self,
        ordered_paths: &[PathBuf],
        output_name_hint: &str,
        format: &str,
    ) -> Result<PathBuf, TransportError>;
}

/// Best-effort removal of temp files. Never fails; problems are logged.
pub trait TempFileCleaner {
    fn remove_temp_files(&self, paths: &[PathBuf]);
}

impl<F> PlaylistSource for F
where
    F: Fn(&str) -> Result<String, TransportError>,
{
    fn fetch_playlist_text(&self, reference: &str) -> Result<String, TransportError> {
        self(reference)
    }
}

impl<F> SegmentFetcher for F
where
    F: Fn(&str) -> Result<PathBuf, TransportError> + Sync,
{
    fn fetch_segment_to_path(&self, uri: &str) -> Result<PathBuf, TransportError> {
        self(uri)
    }
}

impl<F> SegmentMerger for F
where
    F: Fn(&[PathBuf], &str, &str) -> Result<PathBuf, TransportError>,
{
    fn merge_segments(
        &self,
        ordered_paths: &[PathBuf],
        output_name_hint: &str,
        format: &str,
    ) -> Result<PathBuf, TransportError> {
        self(ordered_paths, output_name_hint, format)
    }
}

impl<F> TempFileCleaner for F
where
    F: Fn(&[PathBuf]),
{
    fn remove_temp_files(&self, paths: &[PathBuf]) {
        self(paths)
    }
}

/// Last path component of a URI, ignoring any query string or fragment.
pub fn segment_file_name(uri: &str) -> Option<&str> {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
}
