//! Accumulators used by the media playlist parser's single forward pass.
//! Each mirrors a type in the `types` module, with every field optional.

use crate::constants::{T_MEDIA_SEQUENCE, T_PLAYLIST_TYPE, T_TARGET_DURATION, T_VERSION};
use crate::directive::{SegmentDirective, SequenceDirective};
use crate::types::media::{MediaSequence, SegmentDescriptor};

/// Segment-level attributes seen since the last boundary, waiting for a URI.
#[derive(Debug, Default)]
pub(crate) struct SegmentBuilder {
    duration: Option<String>,
    title: Option<String>,
    byterange: Option<String>,
    key: Option<String>,
    map: Option<String>,
    program_date_time: Option<String>,
    date_range: Option<String>,
}

impl SegmentBuilder {
    /// Incorporates a segment-level directive. When a tag repeats before the URI,
    /// the one closest to the URI wins.
    pub(crate) fn incorporate(&mut self, directive: SegmentDirective) {
        match directive {
            SegmentDirective::Inf { duration, title } => {
                self.duration = Some(duration);
                self.title = title;
            }
            SegmentDirective::ByteRange(v) => self.byterange = Some(v),
            SegmentDirective::Key(v) => self.key = Some(v),
            SegmentDirective::Map(v) => self.map = Some(v),
            SegmentDirective::ProgramDateTime(v) => self.program_date_time = Some(v),
            SegmentDirective::DateRange(v) => self.date_range = Some(v),
        }
    }

    /// Drain pending attributes onto the segment at `uri`, leaving the builder empty.
    pub(crate) fn flush(&mut self, uri: &str) -> SegmentDescriptor {
        let pending = std::mem::take(self);
        SegmentDescriptor {
            uri: uri.to_owned(),
            duration: pending.duration,
            title: pending.title,
            byterange: pending.byterange,
            key: pending.key,
            map: pending.map,
            program_date_time: pending.program_date_time,
            date_range: pending.date_range,
        }
    }

    /// Discard pending attributes at a boundary line.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Sequence-level metadata, filled in place over the whole pass.
#[derive(Debug, Default)]
pub(crate) struct SequenceBuilder {
    segments: Vec<SegmentDescriptor>,
    target_duration: Option<String>,
    media_sequence_number: Option<String>,
    playlist_type: Option<String>,
    endlist: bool,
    version: Option<String>,
    pub(crate) saw_segment_duration: bool,
}

impl SequenceBuilder {
    /// Incorporates a sequence-level directive. The first occurrence in the text wins.
    pub(crate) fn incorporate(&mut self, directive: SequenceDirective) {
        match directive {
            SequenceDirective::TargetDuration(v) => {
                set_once(&mut self.target_duration, v, T_TARGET_DURATION)
            }
            SequenceDirective::MediaSequence(v) => {
                set_once(&mut self.media_sequence_number, v, T_MEDIA_SEQUENCE)
            }
            SequenceDirective::PlaylistType(v) => {
                set_once(&mut self.playlist_type, v, T_PLAYLIST_TYPE)
            }
            SequenceDirective::EndList => self.endlist = true,
        }
    }

    pub(crate) fn set_version(&mut self, version: String) {
        set_once(&mut self.version, version, T_VERSION);
    }

    pub(crate) fn push_segment(&mut self, segment: SegmentDescriptor) {
        self.segments.push(segment);
    }

    pub(crate) fn has_target_duration(&self) -> bool {
        self.target_duration.is_some()
    }

    pub(crate) fn build(self) -> MediaSequence {
        MediaSequence {
            segments: self.segments,
            target_duration: self.target_duration,
            media_sequence_number: self.media_sequence_number,
            playlist_type: self.playlist_type,
            endlist: self.endlist,
            version: self.version,
        }
    }
}

fn set_once(slot: &mut Option<String>, value: String, tag: &str) {
    match slot {
        None => *slot = Some(value),
        Some(existing) if *existing != value => {
            tracing::warn!(tag, kept = %existing, ignored = %value, "conflicting sequence directive");
        }
        Some(_) => (),
    }
}
