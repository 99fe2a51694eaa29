//! Master playlist parsing: maps each rendition's vertical resolution to its media playlist.

use crate::config::ParserConfig;
use crate::constants::{P_RESOLUTION, T_STREAM_INF};
use crate::directive::{Classified, Directive};
use crate::error::{ParseError, Result};
use crate::parsers::{check_signature, is_directive_line, playlist_lines};
use crate::types::attributes::StreamAttributes;
use crate::types::master::RenditionMap;

/// Parse master playlist text into a [`RenditionMap`].
///
/// Every `#EXT-X-STREAM-INF` line must be followed by a line referencing a playlist
/// with an accepted extension. Duplicate resolutions resolve last-write-wins.
pub fn parse_master(text: &str, config: &ParserConfig) -> Result<RenditionMap> {
    check_signature(text)?;
    let lines = playlist_lines(text);

    let mut renditions = RenditionMap::default();
    for (idx, line) in lines.iter().enumerate() {
        if !is_directive_line(line) {
            continue;
        }
        let directive = Directive::parse(line)?;
        match directive.classify()? {
            Some(Classified::Rendition(attributes)) => {
                let reference = rendition_reference(&lines, idx, config)?;
                let height = resolution_height(&attributes, line)?;
                if let Some(previous) = renditions.insert(height.to_owned(), reference.to_owned()) {
                    tracing::debug!(height, %previous, reference, "duplicate resolution, keeping the later one");
                }
            }
            // Signature and version never describe a selectable rendition
            Some(Classified::Boundary(_)) => (),
            Some(Classified::Sequence(_) | Classified::Segment(_)) => {
                tracing::debug!(tag = directive.tag, "ignoring media directive in master playlist");
            }
            None => tracing::debug!(tag = directive.tag, "ignoring unrecognized directive"),
        }
    }

    if renditions.is_empty() {
        return Err(ParseError::format(
            "master playlist does not reference any child playlist",
        ));
    }
    Ok(renditions)
}

/// The line right after the stream-info directive at `idx`.
fn rendition_reference<'a>(lines: &[&'a str], idx: usize, config: &ParserConfig) -> Result<&'a str> {
    match lines.get(idx + 1).copied() {
        None => Err(ParseError::MissingResource {
            directive: T_STREAM_INF.to_owned(),
        }),
        Some(next) if is_directive_line(next) => Err(ParseError::MissingResource {
            directive: T_STREAM_INF.to_owned(),
        }),
        Some(next) if config.references_playlist(next) => Ok(next),
        Some(next) => Err(ParseError::malformed(
            next,
            format!("{T_STREAM_INF} must be followed by a playlist reference"),
        )),
    }
}

fn resolution_height<'a>(attributes: &'a StreamAttributes, line: &str) -> Result<&'a str> {
    attributes
        .get(P_RESOLUTION)
        .and_then(|v| v.as_resolution())
        .map(|r| r.height.as_str())
        .ok_or_else(|| {
            ParseError::malformed(line, format!("{T_STREAM_INF} lacks a WxH {P_RESOLUTION}"))
        })
}
