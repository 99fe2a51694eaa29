//! Segment concatenation with ffmpeg's concat demuxer.

use std::path::{Path, PathBuf};
use std::process::Command;

use hls_assemble::{SegmentMerger, TransportError};

use crate::config::AppConfig;

/// Merges segments by stream copy into `<output_dir>/<hint>.<format>`.
///
/// The concat list is written into the temp directory under the temp marker and
/// removed once ffmpeg exits.
pub struct FfmpegMerger {
    ffmpeg: PathBuf,
    output_dir: PathBuf,
    temp_dir: PathBuf,
    marker: String,
}

impl FfmpegMerger {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            output_dir: config.output_dir.clone(),
            temp_dir: config.assembler.temp_dir.clone(),
            marker: config.assembler.temp_file_marker.clone(),
        }
    }

    fn run(&self, list_path: &Path, output: &Path) -> Result<(), TransportError> {
        tracing::info!(output = %output.display(), "merging segments with ffmpeg");
        let result = Command::new(&self.ffmpeg)
            .args(["-y", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(list_path)
            .args(["-c", "copy"])
            .arg(output)
            .output()
            .map_err(|e| {
                TransportError::with_source(format!("cannot run {}", self.ffmpeg.display()), e)
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TransportError::new(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl SegmentMerger for FfmpegMerger {
    fn merge_segments(
        &self,
        ordered_paths: &[PathBuf],
        output_name_hint: &str,
        format: &str,
    ) -> Result<PathBuf, TransportError> {
        let name = output_stem(output_name_hint);
        let list = concat_list(ordered_paths)
            .map_err(|e| TransportError::with_source("cannot build concat list", e))?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| {
            TransportError::with_source(format!("cannot create {}", self.output_dir.display()), e)
        })?;
        let list_path = self.temp_dir.join(format!("{}-concat-{name}.txt", self.marker));
        std::fs::write(&list_path, list).map_err(|e| {
            TransportError::with_source(format!("cannot write {}", list_path.display()), e)
        })?;

        let output = self.output_dir.join(format!("{name}.{format}"));
        let merged = self.run(&list_path, &output);
        if let Err(e) = std::fs::remove_file(&list_path) {
            tracing::warn!(path = %list_path.display(), error = %e, "failed to remove concat list");
        }
        merged.map(|()| output)
    }
}

/// Body of an ffmpeg concat list: one `file '<absolute path>'` line per segment.
fn concat_list(paths: &[PathBuf]) -> std::io::Result<String> {
    let mut list = String::new();
    for path in paths {
        let absolute = std::path::absolute(path)?;
        let quoted = absolute.to_string_lossy().replace('\'', r"'\''");
        list.push_str(&format!("file '{quoted}'\n"));
    }
    Ok(list)
}

/// File-system-safe stem for the merged file.
fn output_stem(hint: &str) -> String {
    let stem = hint
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect::<String>();
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        "output".to_owned()
    } else {
        stem.to_owned()
    }
}
