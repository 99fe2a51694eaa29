//! Blocking HTTP access to playlists and segments.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use hls_assemble::collab::segment_file_name;
use hls_assemble::{AssemblerConfig, PlaylistSource, SegmentFetcher, TransportError};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use url::Url;

use crate::config::AppConfig;

/// Resolves references against the most recently fetched playlist (or a fixed base)
/// and downloads them with a shared blocking client.
///
/// Only references whose extension is on the configured allow-lists, and URLs whose
/// scheme is accepted, are requested.
///
/// Unless the base is fixed, every playlist fetch moves the base, so a transport
/// follows one assembly run at a time.
pub struct HttpTransport {
    client: Client,
    base: RwLock<Url>,
    fixed_base: bool,
    accepted_schemes: Vec<String>,
    next_sequence: AtomicUsize,
    config: AssemblerConfig,
}

impl HttpTransport {
    pub fn new(base: Url, config: &AppConfig) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        Ok(Self {
            client: builder.build()?,
            base: RwLock::new(base),
            fixed_base: false,
            accepted_schemes: config.accepted_schemes.clone(),
            next_sequence: AtomicUsize::new(0),
            config: config.assembler.clone(),
        })
    }

    /// Keep resolving against the initial base instead of following fetched playlists.
    pub fn with_fixed_base(mut self) -> Self {
        self.fixed_base = true;
        self
    }

    /// Absolute URL for `reference`, relative to the current base.
    /// Fails when the result uses a scheme outside the accepted list.
    pub fn resolve(&self, reference: &str) -> Result<Url, TransportError> {
        let url = {
            let base = self.base.read().unwrap_or_else(PoisonError::into_inner);
            base.join(reference).map_err(|e| {
                TransportError::with_source(format!("cannot resolve '{reference}' against {base}"), e)
            })?
        };
        if !self
            .accepted_schemes
            .iter()
            .any(|scheme| scheme.eq_ignore_ascii_case(url.scheme()))
        {
            return Err(TransportError::new(format!(
                "refusing to fetch {url}: scheme '{}' is not accepted",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Later references resolve against `url`, unless the base is fixed.
    fn follow(&self, url: Url) {
        if !self.fixed_base {
            *self.base.write().unwrap_or_else(PoisonError::into_inner) = url;
        }
    }

    /// A temp path no other fetch through this transport has used.
    fn segment_path(&self, name: &str) -> PathBuf {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.config.temp_dir.join(self.config.temp_file_name(sequence, name))
    }

    fn get(&self, url: &Url, accept: &str) -> Result<reqwest::blocking::Response, TransportError> {
        self.client
            .get(url.clone())
            .header(ACCEPT, accept)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|e| TransportError::with_source(format!("GET {url} failed"), e))
    }
}

impl PlaylistSource for HttpTransport {
    fn fetch_playlist_text(&self, reference: &str) -> Result<String, TransportError> {
        if !self.config.parser.references_playlist(reference) {
            return Err(TransportError::new(format!(
                "refusing to fetch '{reference}': not a playlist reference"
            )));
        }
        let url = self.resolve(reference)?;
        tracing::info!(%url, "fetching playlist");
        let text = self
            .get(&url, "application/vnd.apple.mpegurl")?
            .text()
            .map_err(|e| TransportError::with_source(format!("reading body of {url} failed"), e))?;

        // References inside this playlist are relative to it
        self.follow(url);
        Ok(text)
    }
}

impl SegmentFetcher for HttpTransport {
    fn fetch_segment_to_path(&self, uri: &str) -> Result<PathBuf, TransportError> {
        if !self.config.parser.references_segment(uri) {
            return Err(TransportError::new(format!(
                "refusing to fetch '{uri}': not a segment reference"
            )));
        }
        let name = segment_file_name(uri)
            .ok_or_else(|| TransportError::new(format!("segment '{uri}' has no file name")))?;
        let url = self.resolve(uri)?;

        let mut response = self.get(&url, "video/mp2t")?;
        std::fs::create_dir_all(&self.config.temp_dir).map_err(|e| {
            TransportError::with_source(
                format!("cannot create {}", self.config.temp_dir.display()),
                e,
            )
        })?;
        let path = self.segment_path(name);
        tracing::debug!(%url, path = %path.display(), "fetching segment");
        write_segment(&path, &mut response)?;
        Ok(path)
    }
}

/// Stream `body` into a new file at `path`. A partially written file is removed.
fn write_segment(path: &Path, body: &mut impl Read) -> Result<(), TransportError> {
    let mut file = File::create(path)
        .map_err(|e| TransportError::with_source(format!("cannot create {}", path.display()), e))?;
    if let Err(e) = std::io::copy(body, &mut file) {
        drop(file);
        if let Err(remove) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), "failed to remove partial segment: {remove}");
        }
        return Err(TransportError::with_source(
            format!("writing {} failed", path.display()),
            e,
        ));
    }
    Ok(())
}
