mod config;
mod merge;
mod transport;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hls_assemble::{PlaylistSource, StreamAssembler};
use hls_parse::{RenditionMap, parse_master};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::config::AppConfig;
use crate::merge::FfmpegMerger;
use crate::transport::HttpTransport;

const CLAP_HELP: &str = "Download one rendition of an HLS stream and merge it into a single file.
Run with -l to list the renditions a master playlist offers.";

#[derive(Parser)]
#[command(about = CLAP_HELP)]
struct Args {
    /// URL of the HLS master playlist
    #[arg(short = 'u')]
    url: String,
    /// Vertical resolution to download, e.g. 720
    #[arg(short = 'r', required_unless_present = "list")]
    resolution: Option<String>,
    /// List available renditions as JSON and exit
    #[arg(short = 'l')]
    list: bool,
    /// Output file name without extension (defaults to the playlist's file stem)
    #[arg(short = 'o')]
    output: Option<String>,
    /// TOML configuration file
    #[arg(short = 'c')]
    config: Option<PathBuf>,
    /// (override) Number of segments fetched at once
    #[arg(short = 'j')]
    jobs: Option<usize>,
}

#[derive(Serialize)]
struct RenditionEntry<'a> {
    resolution: String,
    playlist: &'a str,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(jobs) = args.jobs {
        config.assembler.concurrency = jobs;
    }

    let master_url = Url::parse(&args.url).context("invalid master playlist URL")?;
    let transport = match config.base_url.clone() {
        Some(base) => HttpTransport::new(base, &config)?.with_fixed_base(),
        None => HttpTransport::new(master_url.clone(), &config)?,
    };
    let master_text = transport
        .fetch_playlist_text(master_url.as_str())
        .context("failed to fetch master playlist")?;

    let resolution = match args.resolution {
        Some(resolution) if !args.list => resolution,
        _ => {
            let renditions = parse_master(&master_text, &config.assembler.parser)?;
            println!("{}", serde_json::to_string_pretty(&rendition_entries(&renditions))?);
            return Ok(());
        }
    };

    let hint = args.output.unwrap_or_else(|| default_output_name(&master_url));
    let merger = FfmpegMerger::new(&config);
    let assembler = StreamAssembler::new(config.assembler.clone(), &transport, &transport, &merger);
    let output = assembler
        .assemble(&master_text, &resolution, &hint)
        .with_context(|| format!("failed to assemble the {resolution}p rendition"))?;

    println!("{}", output.display());
    Ok(())
}

/// Renditions in ascending resolution order.
fn rendition_entries(renditions: &RenditionMap) -> Vec<RenditionEntry<'_>> {
    renditions
        .resolutions()
        .into_iter()
        .filter_map(|resolution| {
            let playlist = renditions.get(&resolution)?;
            Some(RenditionEntry {
                resolution,
                playlist,
            })
        })
        .collect()
}

/// File stem of the master playlist URL's last path segment.
fn default_output_name(master_url: &Url) -> String {
    master_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.').map(|(stem, _)| stem).or(Some(name)))
        .filter(|stem| !stem.is_empty())
        .unwrap_or("output")
        .to_owned()
}
