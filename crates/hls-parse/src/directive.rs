//! Tokenized directive lines and their classification into known directive kinds.

use crate::constants::*;
use crate::error::Result;
use crate::parsers::{decode_attributes, tag_of, value_of};
use crate::types::attributes::StreamAttributes;

/// A single `#EXT...` line split into tag and raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive<'a> {
    pub tag: &'a str,
    pub raw_value: &'a str,
    pub source_line: &'a str,
}

/// Lines that delimit segment-level attachment and never describe a rendition or segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryDirective {
    Signature,
    Version(String),
}

/// Directives whose data applies to a whole media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceDirective {
    TargetDuration(String),
    MediaSequence(String),
    PlaylistType(String),
    EndList,
}

/// Directives whose data applies only to the segment URI that follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentDirective {
    /// `EXTINF:<duration>[,<title>]`
    Inf {
        duration: String,
        title: Option<String>,
    },
    ByteRange(String),
    Key(String),
    Map(String),
    ProgramDateTime(String),
    DateRange(String),
}

/// Every directive kind the parsers act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Boundary(BoundaryDirective),
    Rendition(StreamAttributes),
    Sequence(SequenceDirective),
    Segment(SegmentDirective),
}

impl<'a> Directive<'a> {
    /// Tokenize a directive line. Fails with `Format` if the line is not a directive.
    pub fn parse(line: &'a str) -> Result<Self> {
        Ok(Self {
            tag: tag_of(line)?,
            raw_value: value_of(line)?,
            source_line: line,
        })
    }

    /// Map the tag onto its typed payload. Returns `Ok(None)` for tags outside the
    /// recognized set; callers ignore those.
    pub fn classify(&self) -> Result<Option<Classified>> {
        let value = || self.raw_value.to_owned();
        let classified = match self.tag {
            T_SIGNATURE => Classified::Boundary(BoundaryDirective::Signature),
            T_VERSION => Classified::Boundary(BoundaryDirective::Version(value())),
            T_STREAM_INF => Classified::Rendition(
                decode_attributes(self.source_line, Some(T_STREAM_INF))?.unwrap_or_default(),
            ),
            T_TARGET_DURATION => Classified::Sequence(SequenceDirective::TargetDuration(value())),
            T_MEDIA_SEQUENCE => Classified::Sequence(SequenceDirective::MediaSequence(value())),
            T_PLAYLIST_TYPE => Classified::Sequence(SequenceDirective::PlaylistType(value())),
            T_ENDLIST => Classified::Sequence(SequenceDirective::EndList),
            T_INF => {
                let (duration, title) = match self.raw_value.split_once(',') {
                    Some((d, t)) if !t.trim().is_empty() => (d, Some(t.trim().to_owned())),
                    Some((d, _)) => (d, None),
                    None => (self.raw_value, None),
                };
                Classified::Segment(SegmentDirective::Inf {
                    duration: duration.trim().to_owned(),
                    title,
                })
            }
            T_BYTERANGE => Classified::Segment(SegmentDirective::ByteRange(value())),
            T_KEY => Classified::Segment(SegmentDirective::Key(value())),
            T_MAP => Classified::Segment(SegmentDirective::Map(value())),
            T_PROGRAM_DATE_TIME => Classified::Segment(SegmentDirective::ProgramDateTime(value())),
            T_DATERANGE => Classified::Segment(SegmentDirective::DateRange(value())),
            _ => return Ok(None),
        };
        Ok(Some(classified))
    }
}
