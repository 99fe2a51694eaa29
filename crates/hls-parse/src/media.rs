//! Media playlist parsing: the ordered segment list plus sequence-level metadata.

use crate::builders::{SegmentBuilder, SequenceBuilder};
use crate::config::ParserConfig;
use crate::constants::{T_INF, T_TARGET_DURATION};
use crate::directive::{BoundaryDirective, Classified, Directive, SegmentDirective};
use crate::error::{ParseError, Result};
use crate::parsers::{check_signature, is_directive_line, playlist_lines};
use crate::types::media::MediaSequence;

/// Parse media playlist text into a [`MediaSequence`] in a single forward pass.
///
/// Segment-level directives accumulate until the next segment URI and attach to it.
/// Any non-directive line, the signature and the version directive discard whatever
/// is pending. Sequence-level directives are recorded wherever they appear.
pub fn parse_media(text: &str, config: &ParserConfig) -> Result<MediaSequence> {
    check_signature(text)?;

    let mut sequence = SequenceBuilder::default();
    let mut pending = SegmentBuilder::default();
    for line in playlist_lines(text) {
        if !is_directive_line(line) {
            if config.references_segment(line) {
                sequence.push_segment(pending.flush(line));
            } else {
                tracing::debug!(line, "line is not a segment reference, dropping pending attributes");
                pending.reset();
            }
            continue;
        }

        let directive = Directive::parse(line)?;
        match directive.classify()? {
            Some(Classified::Boundary(BoundaryDirective::Signature)) => pending.reset(),
            Some(Classified::Boundary(BoundaryDirective::Version(version))) => {
                sequence.set_version(version);
                pending.reset();
            }
            Some(Classified::Sequence(d)) => sequence.incorporate(d),
            Some(Classified::Segment(d)) => {
                if matches!(d, SegmentDirective::Inf { .. }) {
                    sequence.saw_segment_duration = true;
                }
                pending.incorporate(d);
            }
            Some(Classified::Rendition(_)) => {
                tracing::debug!(tag = directive.tag, "ignoring master directive in media playlist");
            }
            None => tracing::debug!(tag = directive.tag, "ignoring unrecognized directive"),
        }
    }

    if !sequence.has_target_duration() || !sequence.saw_segment_duration {
        return Err(ParseError::format(format!(
            "media playlist requires both {T_TARGET_DURATION} and {T_INF} directives"
        )));
    }
    Ok(sequence.build())
}
