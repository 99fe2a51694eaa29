//! `nom`-compatible parser functions for single playlist lines:
//! directive tokenizing and attribute list decoding.
//!
//! Parsers operate on one trimmed line at a time. Playlist-level scanning
//! lives in the `master` and `media` modules.

use nom::branch::alt;
use nom::bytes::complete::{is_not, tag, take_till, take_until};
use nom::character::complete::char;
use nom::combinator::{all_consuming, opt, recognize, rest};
use nom::multi::{many0, separated_list1};
use nom::sequence::preceded;
use nom::{IResult, Parser};

use crate::constants::{DIRECTIVE_PREFIX, P_RESOLUTION, SIGNATURE};
use crate::error::{ParseError, Result};
use crate::types::attributes::{AttributeValue, Resolution, StreamAttributes};

type NomStrError<'a> = nom::error::Error<&'a str>;

/// Returns true iff the line begins with the `#EXT` directive prefix.
pub fn is_directive_line(line: &str) -> bool {
    extension_prefix().parse(line.trim_start()).is_ok()
}

/// Tag of a directive line: the text between the leading '#' and the first ':'.
/// Lines without a colon (e.g. `#EXT-X-ENDLIST`) are all tag.
pub fn tag_of(line: &str) -> Result<&str> {
    let (tag, _) = split_directive(line)?;
    Ok(tag)
}

/// Value of a directive line: the text after the first ':', with a single trailing
/// comma dropped. Empty when the line has no colon.
pub fn value_of(line: &str) -> Result<&str> {
    let (_, value) = split_directive(line)?;
    let value = value.unwrap_or("");
    Ok(value.strip_suffix(',').unwrap_or(value))
}

fn split_directive(line: &str) -> Result<(&str, Option<&str>)> {
    let line = line.trim();
    if !is_directive_line(line) {
        return Err(ParseError::format(format!(
            "not a playlist directive line: '{line}'"
        )));
    }
    match directive_parts(line) {
        Ok((_, parts)) => Ok(parts),
        Err(e) => Err(ParseError::format(format!("{e}"))),
    }
}

/// Parser for the `#EXT` prefix. Matches without consuming the tag body,
/// solely meant for composition and line classification.
fn extension_prefix<'a>() -> impl Parser<&'a str, Output = &'a str, Error = NomStrError<'a>> {
    tag(DIRECTIVE_PREFIX)
}

/// Split "#TAG:value" into ("TAG", Some("value")), or "#TAG" into ("TAG", None).
fn directive_parts(data: &str) -> IResult<&str, (&str, Option<&str>)> {
    preceded(
        char('#'),
        (
            take_till(|c: char| c == ':'),
            opt(preceded(char(':'), rest)),
        ),
    )
    .parse(data)
}

/// Trimmed, non-empty lines of a playlist.
pub(crate) fn playlist_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Fail with `Format` unless the first non-blank line is the `#EXTM3U` signature.
pub(crate) fn check_signature(text: &str) -> Result<()> {
    match text.trim_start().strip_prefix(SIGNATURE) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => Ok(()),
        _ => Err(ParseError::format(format!(
            "playlist does not begin with the {SIGNATURE} signature"
        ))),
    }
}

// ---------- Attribute lists (KEY=VALUE,KEY="quoted, value",...) ----------

/// Decode the attribute list of a directive line.
///
/// Fails with `TagMismatch` if `expected_tag` is given and the line carries another tag.
/// Returns `Ok(None)` when the value holds no `=` at all.
///
/// Each comma-separated piece is split on its *first* `=` only, so a quoted value
/// containing `=` keeps everything after the first one. Commas inside double quotes
/// do not split pieces. Values stay raw (quotes included), except `RESOLUTION=WxH`
/// which becomes a [`Resolution`].
pub fn decode_attributes(line: &str, expected_tag: Option<&str>) -> Result<Option<StreamAttributes>> {
    let tag = tag_of(line)?;
    if let Some(expected) = expected_tag {
        if expected != tag {
            return Err(ParseError::TagMismatch {
                expected: expected.to_owned(),
                found: tag.to_owned(),
            });
        }
    }

    let value = value_of(line)?;
    if !value.contains('=') {
        return Ok(None);
    }

    let pieces = match attribute_pieces(value) {
        Ok((_, pieces)) => pieces,
        Err(e) => {
            return Err(ParseError::format(format!(
                "unbalanced attribute list in '{tag}': {e}"
            )));
        }
    };

    let mut attributes = StreamAttributes::new();
    for piece in pieces {
        let Some((name, raw)) = piece.split_once('=') else {
            tracing::debug!(tag, piece, "skipping attribute without '='");
            continue;
        };
        let name = name.trim();
        let raw = raw.trim();
        let value = if name == P_RESOLUTION {
            resolution_value(raw)
        } else {
            AttributeValue::Scalar(raw.to_owned())
        };
        attributes.insert(name.to_owned(), value);
    }
    Ok(Some(attributes))
}

fn resolution_value(raw: &str) -> AttributeValue {
    match raw.split_once('x') {
        Some((width, height)) if !width.is_empty() && !height.is_empty() => {
            AttributeValue::Resolution(Resolution {
                width: width.to_owned(),
                height: height.to_owned(),
            })
        }
        _ => AttributeValue::Scalar(raw.to_owned()),
    }
}

/// Split an attribute list on top-level commas. Empty pieces are dropped.
fn attribute_pieces(data: &str) -> IResult<&str, Vec<&str>> {
    all_consuming(separated_list1(char(','), attribute_piece))
        .parse(data)
        .map(|(rem, pieces)| (rem, pieces.into_iter().filter(|p| !p.is_empty()).collect()))
}

/// One piece of an attribute list: a run of unquoted text and quoted strings.
fn attribute_piece(data: &str) -> IResult<&str, &str> {
    recognize(many0(alt((double_quoted, is_not(",\""))))).parse(data)
}

fn double_quoted(data: &str) -> IResult<&str, &str> {
    recognize((char('"'), take_until("\""), char('"'))).parse(data)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_directive_line() {
        assert!(is_directive_line("#EXTM3U"));
        assert!(is_directive_line("#EXT-X-VERSION:3"));
        assert!(is_directive_line("  #EXTINF:5.0,"));
        assert!(!is_directive_line("# just a comment"));
        assert!(!is_directive_line("seg_000.ts"));
        assert!(!is_directive_line(""));
    }

    #[test]
    fn test_signature() {
        assert!(check_signature("#EXTM3U\n#EXT-X-VERSION:3").is_ok());
        assert!(check_signature("\n  #EXTM3U\r\n").is_ok());
        assert!(check_signature("#EXT-X-VERSION:3\n#EXTM3U").is_err());
        assert!(check_signature("#EXTM3UX").is_err());
        assert!(check_signature("").is_err());
    }

    #[test]
    fn test_tag_of() {
        assert_eq!(tag_of("#EXT-X-VERSION:3").unwrap(), "EXT-X-VERSION");
        assert_eq!(tag_of("#EXTINF:5.760000,").unwrap(), "EXTINF");
        assert_eq!(tag_of("#EXT-X-ENDLIST").unwrap(), "EXT-X-ENDLIST");
        assert_eq!(tag_of("#EXTM3U").unwrap(), "EXTM3U");
        assert_eq!(
            tag_of("#EXT-X-PROGRAM-DATE-TIME:2024-01-01T00:00:00Z").unwrap(),
            "EXT-X-PROGRAM-DATE-TIME"
        );
    }

    #[test]
    fn test_value_of() {
        assert_eq!(value_of("#EXT-X-VERSION:3").unwrap(), "3");
        assert_eq!(value_of("#EXTINF:5.760000,").unwrap(), "5.760000");
        // Only one trailing comma is trimmed
        assert_eq!(value_of("#EXTINF:5.0,,").unwrap(), "5.0,");
        assert_eq!(value_of("#EXT-X-ENDLIST").unwrap(), "");
        // Everything after the first colon is kept
        assert_eq!(
            value_of("#EXT-X-PROGRAM-DATE-TIME:2024-01-01T00:00:00Z").unwrap(),
            "2024-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_non_directive_fails() {
        assert!(matches!(tag_of("seg_000.ts"), Err(ParseError::Format(_))));
        assert!(matches!(value_of("720p.m3u8"), Err(ParseError::Format(_))));
    }

    #[test]
    fn test_decode_stream_info() {
        let line = "#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720";
        let attrs = decode_attributes(line, Some("EXT-X-STREAM-INF"))
            .unwrap()
            .unwrap();
        assert_eq!(attrs.len(), 2);
        assert_eq!(attrs["BANDWIDTH"].as_scalar(), Some("2800000"));
        assert_eq!(
            attrs["RESOLUTION"],
            AttributeValue::Resolution(Resolution {
                width: "1280".to_owned(),
                height: "720".to_owned(),
            })
        );
    }

    #[test]
    fn test_decode_quoted_commas() {
        let line = "#EXT-X-STREAM-INF:BANDWIDTH=1,CODECS=\"mp4a.40.2,avc1.4d401f\",RESOLUTION=640x360";
        let attrs = decode_attributes(line, None).unwrap().unwrap();
        assert_eq!(attrs["CODECS"].as_scalar(), Some("\"mp4a.40.2,avc1.4d401f\""));
        assert_eq!(attrs["RESOLUTION"].as_resolution().unwrap().height, "360");
    }

    #[test]
    fn test_decode_splits_on_first_equals_only() {
        let line = "#EXT-X-STREAM-INF:URI=\"a?b=c\",BANDWIDTH=5";
        let attrs = decode_attributes(line, None).unwrap().unwrap();
        assert_eq!(attrs["URI"].as_scalar(), Some("\"a?b=c\""));
        assert_eq!(attrs["BANDWIDTH"].as_scalar(), Some("5"));
    }

    #[test]
    fn test_decode_without_equals_is_empty() {
        assert_eq!(decode_attributes("#EXT-X-VERSION:3", None).unwrap(), None);
        assert_eq!(decode_attributes("#EXT-X-ENDLIST", None).unwrap(), None);
    }

    #[test]
    fn test_decode_tag_mismatch() {
        let err = decode_attributes("#EXT-X-VERSION:3", Some("EXT-X-STREAM-INF")).unwrap_err();
        assert_eq!(
            err,
            ParseError::TagMismatch {
                expected: "EXT-X-STREAM-INF".to_owned(),
                found: "EXT-X-VERSION".to_owned(),
            }
        );
        assert_eq!(err.error_code(), "TAG_MISMATCH");
    }

    #[test]
    fn test_decode_unbalanced_quotes() {
        let line = "#EXT-X-STREAM-INF:BANDWIDTH=1,CODECS=\"avc1";
        assert!(matches!(
            decode_attributes(line, None),
            Err(ParseError::Format(_))
        ));
    }

    #[test]
    fn test_resolution_not_wxh_stays_scalar() {
        let attrs = decode_attributes("#EXT-X-STREAM-INF:RESOLUTION=hd", None)
            .unwrap()
            .unwrap();
        assert_eq!(attrs["RESOLUTION"].as_scalar(), Some("hd"));
    }
}
