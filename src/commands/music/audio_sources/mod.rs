//! This module defines the interface for turning a media URL into a playable local file.
//! It provides the `AssetResolver` trait consumed by the playback controller, the
//! `ResolvedAsset` produced by a successful download, and the `yt-dlp` backed implementation.

/// Submodule defining the `TrackMetadata` struct parsed from resolver output.
pub mod track_metadata;
/// Submodule implementing the `AssetResolver` trait on top of `yt-dlp`.
pub mod youtube;

use serenity::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub use track_metadata::TrackMetadata;

/// Errors that can occur while resolving a URL to metadata or a local audio file.
///
/// None of these are fatal to the process; they only fail the request that caused them.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("Unsupported URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to run resolver: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Network failure: {0}")]
    Network(String),

    #[error("Source unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to parse metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("Transcoded file not found: {}", .0.display())]
    Transcode(PathBuf),

    #[error("Resolver worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// A specialized `Result` type for resolver operations.
pub type ResolutionResult<T> = Result<T, ResolutionError>;

/// Turns a URL into metadata and a playable local audio file.
///
/// Both async operations may be slow. Implementations must run the actual work
/// off the calling task (e.g. on the blocking pool) so other guilds stay responsive.
#[async_trait]
pub trait AssetResolver: Send + Sync {
    /// Pure syntactic check. Runs before any network activity.
    fn validate(&self, url: &str) -> bool;

    /// Looks up title/uploader without downloading any audio.
    async fn fetch_metadata(&self, url: &str) -> ResolutionResult<TrackMetadata>;

    /// Downloads and transcodes the audio to a local file.
    async fn download(&self, url: &str) -> ResolutionResult<ResolvedAsset>;
}

/// A downloaded audio file together with the metadata needed to announce it.
///
/// The asset owns its file: dropping it removes the file from disk. Removal is
/// best-effort and failures are only logged.
#[derive(Debug)]
pub struct ResolvedAsset {
    path: PathBuf,
    metadata: TrackMetadata,
}

impl ResolvedAsset {
    pub fn new(path: impl Into<PathBuf>, metadata: TrackMetadata) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn uploader(&self) -> &str {
        &self.metadata.uploader
    }

    pub fn metadata(&self) -> &TrackMetadata {
        &self.metadata
    }
}

impl Drop for ResolvedAsset {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed audio file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove audio file {}: {}", self.path.display(), e),
        }
    }
}
