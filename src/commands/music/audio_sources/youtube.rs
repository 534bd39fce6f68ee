//! Implements the `AssetResolver` trait for YouTube.
//! Uses the `yt-dlp` command-line tool for metadata lookups and downloads.

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serenity::async_trait;
use tracing::{debug, info};
use url::Url;

use super::{AssetResolver, ResolutionError, ResolutionResult, ResolvedAsset, TrackMetadata};
use crate::config::Config;

/// Regex matching yt-dlp error output that points at a connectivity problem
/// rather than at the video itself.
static NETWORK_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(unable to download webpage|timed out|connection (reset|refused|aborted)|temporary failure in name resolution|network is unreachable)")
        .unwrap()
});

/// Resolves YouTube (and YouTube Music) URLs by shelling out to `yt-dlp`.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
    output_dir: PathBuf,
    ffmpeg_location: Option<PathBuf>,
    audio_format: String,
    audio_quality: String,
    /// Per-download sequence number, shared between clones.
    next_download: Arc<AtomicU64>,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
            ffmpeg_location: None,
            audio_format: "mp3".to_string(),
            audio_quality: "192K".to_string(),
            next_download: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            program: config.ytdlp_path.clone(),
            output_dir: config.song_dir.clone(),
            ffmpeg_location: config.ffmpeg_path.clone(),
            audio_format: config.audio_format.clone(),
            audio_quality: config.audio_quality.clone(),
            next_download: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Checks if the input string is a YouTube or YouTube Music URL.
    pub fn is_youtube_url(query: &str) -> bool {
        match Url::parse(query) {
            Ok(url) => {
                matches!(url.scheme(), "http" | "https")
                    && url.host_str().is_some_and(|host| {
                        host == "youtube.com" || host.ends_with(".youtube.com") || host == "youtu.be"
                    })
            }
            Err(_) => false,
        }
    }

    /// Arguments for a metadata-only lookup.
    fn metadata_args(url: &str) -> Vec<String> {
        vec!["-j".into(), "--no-playlist".into(), url.into()]
    }

    /// Reserve a sequence number for one download.
    fn next_download(&self) -> u64 {
        self.next_download.fetch_add(1, Ordering::Relaxed)
    }

    /// Arguments for a download that transcodes to the configured format.
    ///
    /// Output files are named `<video id>-<download>` so two guilds fetching
    /// the same video never share (or delete) each other's file.
    fn download_args(&self, url: &str, download: u64) -> Vec<String> {
        let template = self.output_dir.join(format!("%(id)s-{}.%(ext)s", download));
        let mut args: Vec<String> = vec![
            "-j".into(),
            "--no-simulate".into(),
            "--no-playlist".into(),
            "-f".into(),
            "bestaudio/best".into(),
            "-x".into(),
            "--audio-format".into(),
            self.audio_format.clone(),
            "--audio-quality".into(),
            self.audio_quality.clone(),
            "-o".into(),
            template.to_string_lossy().into_owned(),
        ];

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        args.push(url.into());
        args
    }

    /// Where the transcoded file for a given video id and download ends up.
    fn output_path(&self, id: &str, download: u64) -> PathBuf {
        self.output_dir
            .join(format!("{}-{}.{}", id, download, self.audio_format))
    }

    /// Run yt-dlp on the blocking pool and map a failed exit into a `ResolutionError`.
    async fn run(&self, args: Vec<String>) -> ResolutionResult<Output> {
        let program = self.program.clone();
        debug!("Running {} {:?}", program, args);

        let output = tokio::task::spawn_blocking(move || Command::new(program).args(args).output())
            .await??;

        if output.status.success() {
            Ok(output)
        } else {
            Err(classify_failure(&String::from_utf8_lossy(&output.stderr)))
        }
    }
}

/// Turn yt-dlp's stderr into the matching error variant.
fn classify_failure(stderr: &str) -> ResolutionError {
    let message = stderr
        .lines()
        .rev()
        .find(|line| line.contains("ERROR"))
        .or_else(|| stderr.lines().rev().find(|line| !line.trim().is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .trim()
        .to_string();

    if NETWORK_FAILURE.is_match(stderr) {
        ResolutionError::Network(message)
    } else {
        ResolutionError::Unavailable(message)
    }
}

#[async_trait]
impl AssetResolver for YtDlpResolver {
    fn validate(&self, url: &str) -> bool {
        Self::is_youtube_url(url)
    }

    async fn fetch_metadata(&self, url: &str) -> ResolutionResult<TrackMetadata> {
        if !self.validate(url) {
            return Err(ResolutionError::InvalidUrl(url.to_string()));
        }

        info!("Fetching metadata for {}", url);
        let output = self.run(Self::metadata_args(url)).await?;
        TrackMetadata::try_from(output)
    }

    async fn download(&self, url: &str) -> ResolutionResult<ResolvedAsset> {
        if !self.validate(url) {
            return Err(ResolutionError::InvalidUrl(url.to_string()));
        }

        let output_dir = self.output_dir.clone();
        tokio::task::spawn_blocking(move || std::fs::create_dir_all(output_dir)).await??;

        let download = self.next_download();
        info!("Downloading audio for {} (download #{})", url, download);
        let output = self.run(self.download_args(url, download)).await?;
        let metadata = TrackMetadata::try_from(output)?;

        let id = metadata
            .id
            .clone()
            .ok_or_else(|| ResolutionError::Unavailable("yt-dlp reported no video id".into()))?;
        let path = self.output_path(&id, download);

        if !path.exists() {
            return Err(ResolutionError::Transcode(path));
        }

        info!("Downloaded '{}' to {}", metadata.title, path.display());
        Ok(ResolvedAsset::new(path, metadata))
    }
}
