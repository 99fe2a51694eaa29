//! Master playlist in, merged media file out.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use hls_parse::constants::{P_METHOD, T_BYTERANGE, T_KEY};
use hls_parse::parsers::decode_attributes;
use hls_parse::{MediaSequence, ParseError, parse_master, parse_media};
use rayon::prelude::*;

use crate::cleanup::GuardedCleaner;
use crate::collab::{PlaylistSource, SegmentFetcher, SegmentMerger, TempFileCleaner};
use crate::config::AssemblerConfig;
use crate::error::{AssembleError, Result, TransportError};

/// Drives one playlist-to-file run per call. Holds no per-run state, so a single
/// assembler can serve many runs; each run owns the temp files it fetched.
/// Collaborators that track state across calls (such as a transport following the
/// last fetched playlist) bound how many runs may overlap.
pub struct StreamAssembler<'a> {
    config: AssemblerConfig,
    playlists: &'a dyn PlaylistSource,
    fetcher: &'a dyn SegmentFetcher,
    merger: &'a dyn SegmentMerger,
    cleaner: Box<dyn TempFileCleaner + 'a>,
}

/// A fetch phase that stopped early, with the paths it had already written.
struct Aborted {
    error: AssembleError,
    fetched: Vec<PathBuf>,
}

impl<'a> StreamAssembler<'a> {
    /// Cleanup defaults to a [`GuardedCleaner`] bound to the configured temp directory.
    pub fn new(
        config: AssemblerConfig,
        playlists: &'a dyn PlaylistSource,
        fetcher: &'a dyn SegmentFetcher,
        merger: &'a dyn SegmentMerger,
    ) -> Self {
        let cleaner = Box::new(GuardedCleaner::new(&config));
        Self {
            config,
            playlists,
            fetcher,
            merger,
            cleaner,
        }
    }

    pub fn with_cleaner(mut self, cleaner: impl TempFileCleaner + 'a) -> Self {
        self.cleaner = Box::new(cleaner);
        self
    }

    /// Fetch the master playlist through the playlist source, then [`assemble`](Self::assemble).
    pub fn assemble_reference(
        &self,
        master_reference: &str,
        resolution: &str,
        output_name_hint: &str,
    ) -> Result<PathBuf> {
        let master_text = self.playlists.fetch_playlist_text(master_reference)?;
        self.assemble(&master_text, resolution, output_name_hint)
    }

    /// Select the rendition at `resolution` (exact key, no fallback), fetch every
    /// segment in playlist order and merge them into one file.
    ///
    /// All-or-nothing: on any failure after a segment was fetched, every fetched
    /// temp file is handed to cleanup before the error is returned.
    pub fn assemble(
        &self,
        master_text: &str,
        resolution: &str,
        output_name_hint: &str,
    ) -> Result<PathBuf> {
        let renditions = parse_master(master_text, &self.config.parser)?;
        let Some(reference) = renditions.get(resolution) else {
            return Err(AssembleError::RenditionNotFound {
                resolution: resolution.to_owned(),
                available: renditions.resolutions(),
            });
        };
        tracing::info!(resolution, reference, "selected rendition");

        let media_text = self.playlists.fetch_playlist_text(reference)?;
        let sequence = parse_media(&media_text, &self.config.parser)?;
        check_supported(&sequence)?;
        tracing::info!(
            segments = sequence.segments.len(),
            duration = sequence.total_duration(),
            "parsed media playlist"
        );

        let fetched = match self.fetch_all(&sequence) {
            Ok(fetched) => fetched,
            Err(Aborted { error, fetched }) => {
                tracing::error!(fetched = fetched.len(), "segment fetch failed: {error}");
                self.cleanup(&fetched);
                return Err(error);
            }
        };

        let merged =
            self.merger
                .merge_segments(&fetched, output_name_hint, &self.config.output_format);
        self.cleanup(&fetched);
        let output = merged?;
        tracing::info!(output = %output.display(), "stream assembled");
        Ok(output)
    }

    fn fetch_all(&self, sequence: &MediaSequence) -> std::result::Result<Vec<PathBuf>, Aborted> {
        if self.config.concurrency <= 1 {
            self.fetch_sequential(sequence)
        } else {
            self.fetch_concurrent(sequence)
        }
    }

    fn fetch_sequential(&self, sequence: &MediaSequence) -> std::result::Result<Vec<PathBuf>, Aborted> {
        let mut fetched = Vec::with_capacity(sequence.segments.len());
        for (idx, segment) in sequence.segments.iter().enumerate() {
            match fetch_with_retries(self.fetcher, self.config.retries, idx, &segment.uri) {
                Ok(path) => fetched.push(path),
                Err(e) => {
                    return Err(Aborted {
                        error: e.into(),
                        fetched,
                    });
                }
            }
        }
        Ok(fetched)
    }

    /// Fetch on a bounded pool. Results are stamped with their playlist index and
    /// re-sorted before use, so completion order never leaks into the merge.
    fn fetch_concurrent(&self, sequence: &MediaSequence) -> std::result::Result<Vec<PathBuf>, Aborted> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .thread_name(|i| format!("segment-fetch-{i}"))
            .build()
            .map_err(|e| Aborted {
                error: e.into(),
                fetched: Vec::new(),
            })?;

        let fetcher = self.fetcher;
        let retries = self.config.retries;
        let abort = AtomicBool::new(false);
        let mut stamped: Vec<(usize, Option<std::result::Result<PathBuf, TransportError>>)> =
            pool.install(|| {
                sequence
                    .segments
                    .par_iter()
                    .enumerate()
                    .map(|(idx, segment)| {
                        // Once any fetch has failed, start no new ones
                        if abort.load(Ordering::Acquire) {
                            return (idx, None);
                        }
                        let result = fetch_with_retries(fetcher, retries, idx, &segment.uri);
                        if result.is_err() {
                            abort.store(true, Ordering::Release);
                        }
                        (idx, Some(result))
                    })
                    .collect()
            });
        stamped.sort_by_key(|(idx, _)| *idx);

        let mut fetched = Vec::with_capacity(stamped.len());
        let mut first_error = None;
        for (_, result) in stamped {
            match result {
                Some(Ok(path)) => fetched.push(path),
                Some(Err(e)) if first_error.is_none() => first_error = Some(e),
                Some(Err(e)) => tracing::debug!("additional segment failure: {e}"),
                None => (),
            }
        }
        match first_error {
            Some(e) => Err(Aborted {
                error: e.into(),
                fetched,
            }),
            None => Ok(fetched),
        }
    }

    fn cleanup(&self, paths: &[PathBuf]) {
        if !paths.is_empty() {
            self.cleaner.remove_temp_files(paths);
        }
    }
}

fn fetch_with_retries(
    fetcher: &dyn SegmentFetcher,
    retries: u32,
    idx: usize,
    uri: &str,
) -> std::result::Result<PathBuf, TransportError> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch_segment_to_path(uri) {
            Ok(path) => {
                tracing::debug!(idx, uri, path = %path.display(), "segment fetched");
                return Ok(path);
            }
            Err(e) if attempt < retries => {
                attempt += 1;
                tracing::warn!(idx, uri, attempt, "segment fetch failed, retrying: {e}");
            }
            Err(e) => return Err(e),
        }
    }
}

/// Reject playlists whose segments cannot simply be concatenated.
fn check_supported(sequence: &MediaSequence) -> Result<()> {
    if sequence.segments.is_empty() {
        return Err(ParseError::Format(
            "media playlist lists no segment with an accepted extension".to_owned(),
        )
        .into());
    }
    for segment in &sequence.segments {
        if segment.byterange.is_some() {
            return Err(AssembleError::UnsupportedSegment {
                uri: segment.uri.clone(),
                directive: T_BYTERANGE.to_owned(),
            });
        }
        if let Some(key) = &segment.key {
            if key_method(key)?.as_deref() != Some("NONE") {
                return Err(AssembleError::UnsupportedSegment {
                    uri: segment.uri.clone(),
                    directive: T_KEY.to_owned(),
                });
            }
        }
    }
    Ok(())
}

/// METHOD attribute of an `EXT-X-KEY` value, decoded quote-aware.
fn key_method(key: &str) -> Result<Option<String>> {
    let line = format!("#{T_KEY}:{key}");
    let method = decode_attributes(&line, Some(T_KEY))?.and_then(|attributes| {
        attributes
            .get(P_METHOD)
            .and_then(|value| value.as_scalar())
            .map(str::to_owned)
    });
    Ok(method)
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p.m3u8
";

    fn media_text(count: usize) -> String {
        let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n");
        for i in 0..count {
            text.push_str(&format!("#EXTINF:6.0,\nseg_{i:03}.ts\n"));
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    fn temp_path(uri: &str) -> PathBuf {
        PathBuf::from("temp").join(format!("tempSegment-{uri}"))
    }

    fn playlists(count: usize) -> impl Fn(&str) -> std::result::Result<String, TransportError> {
        move |reference: &str| match reference {
            "720p.m3u8" | "360p.m3u8" => Ok(media_text(count)),
            other => Err(TransportError::new(format!("unexpected reference {other}"))),
        }
    }

    /// Records what the merger and cleaner were handed.
    #[derive(Default)]
    struct Recorder {
        merged: Mutex<Vec<PathBuf>>,
        cleaned: Mutex<Vec<PathBuf>>,
    }

    impl Recorder {
        fn merger(&self) -> impl Fn(&[PathBuf], &str, &str) -> std::result::Result<PathBuf, TransportError> + '_ {
            move |paths: &[PathBuf], hint: &str, format: &str| {
                self.merged.lock().unwrap().extend_from_slice(paths);
                Ok(PathBuf::from(format!("{hint}.{format}")))
            }
        }

        fn cleaner(&self) -> impl Fn(&[PathBuf]) + '_ {
            move |paths: &[PathBuf]| self.cleaned.lock().unwrap().extend_from_slice(paths)
        }
    }

    fn ok_fetcher(uri: &str) -> std::result::Result<PathBuf, TransportError> {
        Ok(temp_path(uri))
    }

    #[test]
    fn test_assemble_in_order() {
        let recorder = Recorder::default();
        let source = playlists(4);
        let fetcher = ok_fetcher;
        let merger = recorder.merger();
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let output = assembler.assemble(MASTER, "720", "clip").unwrap();
        assert_eq!(output, PathBuf::from("clip.mp4"));

        let expected = (0..4)
            .map(|i| temp_path(&format!("seg_{i:03}.ts")))
            .collect::<Vec<_>>();
        assert_eq!(*recorder.merged.lock().unwrap(), expected);
        // Cleanup runs after a successful merge too
        assert_eq!(*recorder.cleaned.lock().unwrap(), expected);
    }

    #[test]
    fn test_nth_failure_cleans_previous_segments() {
        let recorder = Recorder::default();
        let source = playlists(5);
        let fetcher = |uri: &str| {
            if uri == "seg_002.ts" {
                Err(TransportError::new("HTTP 503 for seg_002.ts"))
            } else {
                Ok(temp_path(uri))
            }
        };
        let merger = recorder.merger();
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble(MASTER, "720", "clip").unwrap_err();
        assert!(matches!(&err, AssembleError::Transport(e) if e.message() == "HTTP 503 for seg_002.ts"));
        assert_eq!(err.error_code(), "TRANSPORT");
        assert_eq!(
            *recorder.cleaned.lock().unwrap(),
            vec![temp_path("seg_000.ts"), temp_path("seg_001.ts")]
        );
        assert!(recorder.merged.lock().unwrap().is_empty());
    }

    #[test]
    fn test_first_failure_cleans_nothing() {
        let recorder = Recorder::default();
        let source = playlists(3);
        let fetcher = |_: &str| -> std::result::Result<PathBuf, TransportError> {
            Err(TransportError::new("refused"))
        };
        let merger = recorder.merger();
        let cleaner_calls = Mutex::new(0);
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(|_: &[PathBuf]| *cleaner_calls.lock().unwrap() += 1);

        assert!(assembler.assemble(MASTER, "360", "clip").is_err());
        drop(assembler);
        assert_eq!(*cleaner_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_merge_failure_cleans_all_segments() {
        let recorder = Recorder::default();
        let source = playlists(3);
        let fetcher = ok_fetcher;
        let merger = |_: &[PathBuf], _: &str, _: &str| -> std::result::Result<PathBuf, TransportError> {
            Err(TransportError::new("ffmpeg exited with status 1"))
        };
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble(MASTER, "720", "clip").unwrap_err();
        assert!(matches!(err, AssembleError::Transport(_)));
        assert_eq!(recorder.cleaned.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_rendition_not_found() {
        let recorder = Recorder::default();
        let source = playlists(3);
        let fetcher = |_: &str| -> std::result::Result<PathBuf, TransportError> {
            panic!("no segment should be fetched")
        };
        let merger = recorder.merger();
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        // 1280 is a width, not a height; there is no closest-match fallback
        for missing in ["1080", "1280", "719"] {
            let err = assembler.assemble(MASTER, missing, "clip").unwrap_err();
            assert!(matches!(
                &err,
                AssembleError::RenditionNotFound { available, .. } if *available == vec!["360", "720"]
            ));
        }
        assert!(recorder.cleaned.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors_propagate() {
        let recorder = Recorder::default();
        let source = |_: &str| -> std::result::Result<String, TransportError> {
            Ok("#EXTM3U\n#EXTINF:4,\na.ts\n".to_owned())
        };
        let fetcher = ok_fetcher;
        let merger = recorder.merger();
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble("not a playlist", "720", "clip").unwrap_err();
        assert!(matches!(err, AssembleError::Parse(ParseError::Format(_))));

        // The child playlist lacks a target duration
        let err = assembler.assemble(MASTER, "720", "clip").unwrap_err();
        assert_eq!(err.error_code(), "FORMAT");
    }

    #[test]
    fn test_playlist_fetch_error_is_unchanged() {
        let recorder = Recorder::default();
        let source = |reference: &str| -> std::result::Result<String, TransportError> {
            Err(TransportError::new(format!("404 {reference}")))
        };
        let fetcher = ok_fetcher;
        let merger = recorder.merger();
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble(MASTER, "360", "clip").unwrap_err();
        assert_eq!(err.to_string(), "404 360p.m3u8");

        let err = assembler
            .assemble_reference("master.m3u8", "360", "clip")
            .unwrap_err();
        assert_eq!(err.to_string(), "404 master.m3u8");
    }

    #[test]
    fn test_unsupported_segments() {
        let recorder = Recorder::default();
        let fetcher = ok_fetcher;
        let merger = recorder.merger();
        let cases = [
            ("#EXT-X-KEY:METHOD=AES-128,URI=\"k.bin\"\n", Some("EXT-X-KEY")),
            ("#EXT-X-BYTERANGE:1000@0\n", Some("EXT-X-BYTERANGE")),
            ("#EXT-X-KEY:METHOD=NONE\n", None),
        ];
        for (directive, rejected) in cases {
            let text = format!("#EXTM3U\n#EXT-X-TARGETDURATION:4\n{directive}#EXTINF:4,\na.ts\n");
            let source = move |_: &str| -> std::result::Result<String, TransportError> { Ok(text.clone()) };
            let assembler =
                StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
                    .with_cleaner(recorder.cleaner());
            let result = assembler.assemble(MASTER, "720", "clip");
            match rejected {
                Some(tag) => assert!(matches!(
                    result,
                    Err(AssembleError::UnsupportedSegment { directive, .. }) if directive == tag
                )),
                None => assert!(result.is_ok()),
            }
        }
    }

    #[test]
    fn test_retries_recover_transient_failures() {
        let recorder = Recorder::default();
        let source = playlists(3);
        let attempts = Mutex::new(HashSet::new());
        // Every segment fails on its first attempt
        let fetcher = |uri: &str| {
            if attempts.lock().unwrap().insert(uri.to_owned()) {
                Err(TransportError::new(format!("timeout {uri}")))
            } else {
                Ok(temp_path(uri))
            }
        };
        let merger = recorder.merger();
        let config = AssemblerConfig {
            retries: 1,
            ..Default::default()
        };
        let assembler = StreamAssembler::new(config, &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        assert!(assembler.assemble(MASTER, "720", "clip").is_ok());
        assert_eq!(recorder.merged.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_exhausted_retries_abort_and_clean_earlier_segments() {
        let recorder = Recorder::default();
        let source = playlists(5);
        let attempts = Mutex::new(0);
        let fetcher = |uri: &str| {
            if uri == "seg_003.ts" {
                *attempts.lock().unwrap() += 1;
                return Err(TransportError::new("HTTP 500 for seg_003.ts"));
            }
            Ok(temp_path(uri))
        };
        let merger = recorder.merger();
        let config = AssemblerConfig {
            retries: 2,
            ..Default::default()
        };
        let assembler = StreamAssembler::new(config, &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble(MASTER, "720", "clip").unwrap_err();
        assert!(matches!(&err, AssembleError::Transport(e) if e.message() == "HTTP 500 for seg_003.ts"));
        // One attempt plus two retries
        assert_eq!(*attempts.lock().unwrap(), 3);
        assert_eq!(
            *recorder.cleaned.lock().unwrap(),
            vec![
                temp_path("seg_000.ts"),
                temp_path("seg_001.ts"),
                temp_path("seg_002.ts"),
            ]
        );
        assert!(recorder.merged.lock().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_fetch_keeps_playlist_order() {
        let recorder = Recorder::default();
        let source = playlists(12);
        // Earlier segments finish last
        let fetcher = |uri: &str| {
            let idx: u64 = uri[4..7].parse().unwrap();
            std::thread::sleep(Duration::from_millis((12 - idx) * 3));
            Ok(temp_path(uri))
        };
        let merger = recorder.merger();
        let config = AssemblerConfig {
            concurrency: 4,
            ..Default::default()
        };
        let assembler = StreamAssembler::new(config, &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        assembler.assemble(MASTER, "720", "clip").unwrap();
        let expected = (0..12)
            .map(|i| temp_path(&format!("seg_{i:03}.ts")))
            .collect::<Vec<_>>();
        assert_eq!(*recorder.merged.lock().unwrap(), expected);
    }

    #[test]
    fn test_concurrent_failure_cleans_every_fetched_segment() {
        let recorder = Recorder::default();
        let source = playlists(10);
        let succeeded = Mutex::new(Vec::new());
        let fetcher = |uri: &str| {
            if uri == "seg_005.ts" {
                return Err(TransportError::new("reset seg_005.ts"));
            }
            let path = temp_path(uri);
            succeeded.lock().unwrap().push(path.clone());
            Ok(path)
        };
        let merger = recorder.merger();
        let config = AssemblerConfig {
            concurrency: 3,
            ..Default::default()
        };
        let assembler = StreamAssembler::new(config, &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble(MASTER, "720", "clip").unwrap_err();
        assert_eq!(err.to_string(), "reset seg_005.ts");

        let cleaned = recorder.cleaned.lock().unwrap().iter().cloned().collect::<HashSet<_>>();
        let succeeded = succeeded.lock().unwrap().iter().cloned().collect::<HashSet<_>>();
        assert_eq!(cleaned, succeeded);
        assert!(!cleaned.contains(&temp_path("seg_005.ts")));
        assert!(recorder.merged.lock().unwrap().is_empty());
    }

    #[test]
    fn test_key_method() {
        assert_eq!(key_method("METHOD=AES-128,URI=\"k\"").unwrap().as_deref(), Some("AES-128"));
        assert_eq!(key_method("URI=\"k\", METHOD=NONE").unwrap().as_deref(), Some("NONE"));
        assert_eq!(key_method("URI=\"k\"").unwrap(), None);
        // A quoted URI cannot smuggle in a second METHOD
        assert_eq!(
            key_method("URI=\"https://k.test/key?a,METHOD=NONE,b\",METHOD=AES-128")
                .unwrap()
                .as_deref(),
            Some("AES-128")
        );
        assert!(key_method("METHOD=AES-128,URI=\"k").is_err());
    }

    #[test]
    fn test_quoted_method_in_key_uri_is_still_rejected() {
        let recorder = Recorder::default();
        let fetcher = |_: &str| -> std::result::Result<PathBuf, TransportError> {
            panic!("encrypted segments are never fetched")
        };
        let merger = recorder.merger();
        let source = |_: &str| -> std::result::Result<String, TransportError> {
            Ok("#EXTM3U
#EXT-X-TARGETDURATION:4
#EXT-X-KEY:URI=\"https://k.test/key?a,METHOD=NONE,b\",METHOD=AES-128
#EXTINF:4,
a.ts
"
            .to_owned())
        };
        let assembler = StreamAssembler::new(AssemblerConfig::default(), &source, &fetcher, &merger)
            .with_cleaner(recorder.cleaner());

        let err = assembler.assemble(MASTER, "720", "clip").unwrap_err();
        assert!(matches!(
            &err,
            AssembleError::UnsupportedSegment { uri, directive } if uri == "a.ts" && directive == "EXT-X-KEY"
        ));
        assert_eq!(err.error_code(), "UNSUPPORTED_SEGMENT");
    }
}
