//! Errors raised while tokenizing or parsing playlist text.

use thiserror::Error;

/// Result type alias for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Input is not a recognized playlist, or a line is not shaped like a directive.
    #[error("invalid playlist format: {0}")]
    Format(String),

    #[error("unexpected directive: expected {expected}, found {found}")]
    TagMismatch { expected: String, found: String },

    /// A stream-info directive is not followed by a resource reference.
    #[error("missing resource path: {directive} must be followed by a playlist reference")]
    MissingResource { directive: String },

    #[error("malformed playlist near '{line}': {reason}")]
    MalformedPlaylist { line: String, reason: String },
}

impl ParseError {
    /// Stable identifier for the error kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            ParseError::Format(_) => "FORMAT",
            ParseError::TagMismatch { .. } => "TAG_MISMATCH",
            ParseError::MissingResource { .. } => "MISSING_RESOURCE",
            ParseError::MalformedPlaylist { .. } => "MALFORMED_PLAYLIST",
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        ParseError::Format(msg.into())
    }

    pub(crate) fn malformed(line: &str, reason: impl Into<String>) -> Self {
        ParseError::MalformedPlaylist {
            line: line.to_owned(),
            reason: reason.into(),
        }
    }
}
