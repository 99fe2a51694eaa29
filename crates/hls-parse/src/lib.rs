//! Parser for HLS playlists of M3U8 format.
//!
//! Handles both playlist tiers: master playlists, reduced to a map from vertical
//! resolution to child playlist, and media playlists, reduced to an ordered list of
//! segments plus sequence-level metadata. Parsing is pure; every call works only
//! on its input text and returns fresh values.

mod builders;
pub mod config;
pub mod constants;
pub mod directive;
pub mod error;
mod master;
mod media;
pub mod parsers;
pub mod types;

use std::str::FromStr;

pub use config::ParserConfig;
pub use error::{ParseError, Result};
pub use master::parse_master;
pub use media::parse_media;
pub use types::attributes::{AttributeValue, Resolution, StreamAttributes};
pub use types::master::RenditionMap;
pub use types::media::{MediaSequence, SegmentDescriptor};

impl FromStr for RenditionMap {
    type Err = ParseError;

    /// Parse with the default allow-lists.
    fn from_str(data: &str) -> std::result::Result<Self, Self::Err> {
        parse_master(data, &ParserConfig::default())
    }
}

impl FromStr for MediaSequence {
    type Err = ParseError;

    /// Parse with the default allow-lists.
    fn from_str(data: &str) -> std::result::Result<Self, Self::Err> {
        parse_media(data, &ParserConfig::default())
    }
}
