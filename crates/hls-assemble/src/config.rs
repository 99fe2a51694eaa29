//! Immutable settings for one assembler instance.

use std::path::PathBuf;

use hls_parse::ParserConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Directory holding fetched segments. Cleanup never touches anything outside it.
    pub temp_dir: PathBuf,
    /// Substring every temp segment file name carries.
    pub temp_file_marker: String,
    /// Container format handed to the merger (e.g. "mp4").
    pub output_format: String,
    /// Segment fetches in flight at once. 1 fetches sequentially.
    pub concurrency: usize,
    /// Extra attempts per segment after the first failure.
    pub retries: u32,
    pub parser: ParserConfig,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            temp_dir: PathBuf::from("temp"),
            temp_file_marker: "tempSegment".to_owned(),
            output_format: "mp4".to_owned(),
            concurrency: 1,
            retries: 0,
            parser: ParserConfig::default(),
        }
    }
}

impl AssemblerConfig {
    /// Local file name for a fetched segment: `<marker>-<sequence>-<original name>`.
    /// Segments sharing a file name in different directories or with different
    /// queries stay apart as long as `sequence` differs.
    pub fn temp_file_name(&self, sequence: usize, segment_name: &str) -> String {
        format!("{}-{sequence:05}-{segment_name}", self.temp_file_marker)
    }
}
