//! Allow-lists deciding which non-directive lines count as playlist or segment references.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Extensions accepted for child playlist references (master tier).
    pub playlist_extensions: Vec<String>,
    /// Extensions accepted for media segment URIs (media tier).
    pub segment_extensions: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            playlist_extensions: vec!["m3u8".to_owned()],
            segment_extensions: vec!["ts".to_owned()],
        }
    }
}

impl ParserConfig {
    pub fn references_playlist(&self, reference: &str) -> bool {
        has_extension(reference, &self.playlist_extensions)
    }

    pub fn references_segment(&self, reference: &str) -> bool {
        has_extension(reference, &self.segment_extensions)
    }
}

/// Extension of the path portion of a reference, ignoring any query string or fragment.
pub fn extension_of(reference: &str) -> Option<&str> {
    let path = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

fn has_extension(reference: &str, accepted: &[String]) -> bool {
    extension_of(reference)
        .is_some_and(|ext| accepted.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}
