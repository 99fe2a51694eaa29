//! Application settings, read from an optional TOML file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use hls_assemble::AssemblerConfig;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base for relative playlist references. Defaults to the master playlist URL.
    pub base_url: Option<Url>,
    /// Where merged files are written.
    pub output_dir: PathBuf,
    /// ffmpeg executable used for merging.
    pub ffmpeg: PathBuf,
    pub user_agent: Option<String>,
    /// URL schemes the transport may request. Anything else is refused.
    pub accepted_schemes: Vec<String>,
    pub assembler: AssemblerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            output_dir: PathBuf::from("."),
            ffmpeg: PathBuf::from("ffmpeg"),
            user_agent: None,
            accepted_schemes: vec!["https".to_owned()],
            assembler: AssemblerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config file {}", path.display()))
    }
}
