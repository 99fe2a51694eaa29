//! Types to represent parsed HLS data, for both playlist tiers.

// Types for decoding the attribute list of #EXT-X-STREAM-INF
pub mod attributes {
    use std::collections::BTreeMap;

    use serde::Serialize;

    /// Dimension pair from a `RESOLUTION=WxH` attribute. Kept as strings; nothing
    /// downstream needs numeric values.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    pub struct Resolution {
        pub width: String,
        pub height: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize)]
    #[serde(untagged)]
    pub enum AttributeValue {
        Scalar(String),
        Resolution(Resolution),
    }

    impl AttributeValue {
        pub fn as_scalar(&self) -> Option<&str> {
            match self {
                AttributeValue::Scalar(s) => Some(s),
                AttributeValue::Resolution(_) => None,
            }
        }

        pub fn as_resolution(&self) -> Option<&Resolution> {
            match self {
                AttributeValue::Resolution(r) => Some(r),
                AttributeValue::Scalar(_) => None,
            }
        }
    }

    /// Attribute name -> value, as decoded from a single directive line.
    pub type StreamAttributes = BTreeMap<String, AttributeValue>;
}

// Types produced by the master playlist parser
pub mod master {
    use std::collections::BTreeMap;
    use std::fmt;

    use serde::Serialize;

    /// Vertical resolution (e.g. "1080") -> child media playlist reference.
    #[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
    #[serde(transparent)]
    pub struct RenditionMap {
        pub(crate) inner: BTreeMap<String, String>,
    }

    impl RenditionMap {
        pub fn get(&self, resolution: &str) -> Option<&str> {
            self.inner.get(resolution).map(String::as_str)
        }

        pub fn len(&self) -> usize {
            self.inner.len()
        }

        pub fn is_empty(&self) -> bool {
            self.inner.is_empty()
        }

        /// Available resolution keys, lowest first. Non-numeric keys sort last.
        pub fn resolutions(&self) -> Vec<String> {
            let mut keys = self.inner.keys().cloned().collect::<Vec<_>>();
            keys.sort_by_key(|k| (k.parse::<u64>().unwrap_or(u64::MAX), k.clone()));
            keys
        }

        /// Returns the previous reference when `resolution` was already present.
        pub(crate) fn insert(&mut self, resolution: String, reference: String) -> Option<String> {
            self.inner.insert(resolution, reference)
        }
    }

    impl fmt::Display for RenditionMap {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for resolution in self.resolutions() {
                writeln!(f, "{resolution}p\t{}", self.inner[&resolution])?;
            }
            Ok(())
        }
    }
}

// Types produced by the media playlist parser
pub mod media {
    use serde::Serialize;

    /// One entry of a media playlist. Optional fields are only set when the
    /// matching directive sits directly above the URI.
    #[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
    pub struct SegmentDescriptor {
        pub uri: String,
        pub duration: Option<String>,
        pub title: Option<String>,
        pub byterange: Option<String>,
        pub key: Option<String>,
        pub map: Option<String>,
        pub program_date_time: Option<String>,
        pub date_range: Option<String>,
    }

    #[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
    pub struct MediaSequence {
        /// Playback (and concatenation) order.
        pub segments: Vec<SegmentDescriptor>,
        pub target_duration: Option<String>,
        pub media_sequence_number: Option<String>,
        pub playlist_type: Option<String>,
        pub endlist: bool,
        pub version: Option<String>,
    }

    impl MediaSequence {
        /// Sum of every segment duration that parses as a number, in seconds.
        pub fn total_duration(&self) -> f64 {
            self.segments
                .iter()
                .filter_map(|s| s.duration.as_deref())
                .filter_map(|d| d.parse::<f64>().ok())
                .sum()
        }
    }
}
