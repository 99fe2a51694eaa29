//! Constants used for HLS parsing.
//! T_* are strs that match HLS directive tags (without the leading '#'),
//! P_* are strs that match HLS attribute names.

/// First line of every playlist.
pub const SIGNATURE: &str = "#EXTM3U";
/// Prefix shared by every directive line.
pub(crate) const DIRECTIVE_PREFIX: &str = "#EXT";

pub const T_SIGNATURE: &str = "EXTM3U";
pub const T_VERSION: &str = "EXT-X-VERSION";
pub const T_STREAM_INF: &str = "EXT-X-STREAM-INF";
pub const T_TARGET_DURATION: &str = "EXT-X-TARGETDURATION";
pub const T_MEDIA_SEQUENCE: &str = "EXT-X-MEDIA-SEQUENCE";
pub const T_PLAYLIST_TYPE: &str = "EXT-X-PLAYLIST-TYPE";
pub const T_ENDLIST: &str = "EXT-X-ENDLIST";
pub const T_INF: &str = "EXTINF";
pub const T_BYTERANGE: &str = "EXT-X-BYTERANGE";
pub const T_KEY: &str = "EXT-X-KEY";
pub const T_MAP: &str = "EXT-X-MAP";
pub const T_PROGRAM_DATE_TIME: &str = "EXT-X-PROGRAM-DATE-TIME";
pub const T_DATERANGE: &str = "EXT-X-DATERANGE";

pub const P_RESOLUTION: &str = "RESOLUTION";
pub const P_METHOD: &str = "METHOD";
