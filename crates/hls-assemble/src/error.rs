//! Error types for stream assembly.

use hls_parse::ParseError;
use thiserror::Error;

/// Result type alias for assembly operations
pub type Result<T> = std::result::Result<T, AssembleError>;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure reported by a fetch or merge collaborator. The assembler never creates
/// these; it passes them through untouched.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("no rendition at resolution {resolution}p (available: {})", .available.join(", "))]
    RenditionNotFound {
        resolution: String,
        available: Vec<String>,
    },

    #[error("segment {uri} requires unsupported {directive}")]
    UnsupportedSegment { uri: String, directive: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to start segment workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

impl AssembleError {
    /// Stable identifier for the error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            AssembleError::Parse(e) => e.error_code(),
            AssembleError::RenditionNotFound { .. } => "RENDITION_NOT_FOUND",
            AssembleError::UnsupportedSegment { .. } => "UNSUPPORTED_SEGMENT",
            AssembleError::Transport(_) => "TRANSPORT",
            AssembleError::WorkerPool(_) => "WORKER_POOL",
        }
    }
}
