//! Turns an HLS master playlist into a single media file.
//!
//! The [`StreamAssembler`] selects a rendition by vertical resolution, parses its
//! media playlist, fetches every segment in order and hands the ordered paths to a
//! merger. Network, disk and media tooling are reached only through the traits in
//! [`collab`], so the pipeline itself carries no transport code.

mod assembler;
pub mod cleanup;
pub mod collab;
pub mod config;
pub mod error;

pub use assembler::StreamAssembler;
pub use cleanup::GuardedCleaner;
pub use collab::{PlaylistSource, SegmentFetcher, SegmentMerger, TempFileCleaner};
pub use config::AssemblerConfig;
pub use error::{AssembleError, BoxError, Result, TransportError};
