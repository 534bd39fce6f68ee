//! Defines the `TrackMetadata` struct, the information about a track that the
//! bot shows to users, and its conversion from `yt-dlp` JSON output.

use crate::commands::music::audio_sources::ResolutionError;
use serde::Deserialize;
use std::process::Output;
use std::time::Duration;

/// Metadata describing a single playable track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackMetadata {
    /// Stable identifier of the asset at its source (e.g. the YouTube video id).
    pub id: Option<String>,
    /// The title of the track.
    pub title: String,
    /// The channel or artist that uploaded the track.
    pub uploader: String,
    /// The canonical page URL, if the source reported one.
    pub url: Option<String>,
    /// The duration of the track, if available.
    pub duration: Option<Duration>,
    /// URL to a thumbnail image for the track, if available.
    pub thumbnail: Option<String>,
}

impl Default for TrackMetadata {
    fn default() -> Self {
        Self {
            id: None,
            title: "Unknown Title".to_string(),
            uploader: "Unknown Uploader".to_string(),
            url: None,
            duration: None,
            thumbnail: None,
        }
    }
}

/// The subset of the `yt-dlp --dump-json` document we care about.
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    webpage_url: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
}

impl TrackMetadata {
    /// Parse a single `yt-dlp` JSON document.
    pub fn from_json(json: &str) -> Result<Self, ResolutionError> {
        let info: YtDlpInfo = serde_json::from_str(json.trim())?;
        let defaults = Self::default();

        Ok(Self {
            id: info.id,
            title: info.title.unwrap_or(defaults.title),
            uploader: info.uploader.or(info.channel).unwrap_or(defaults.uploader),
            url: info.webpage_url,
            duration: info
                .duration
                .filter(|secs| secs.is_finite() && *secs >= 0.0)
                .map(Duration::from_secs_f64),
            thumbnail: info.thumbnail,
        })
    }
}

/// Converts the output of a successful `yt-dlp -j` run into `TrackMetadata`.
impl TryFrom<Output> for TrackMetadata {
    type Error = ResolutionError;

    fn try_from(value: Output) -> Result<Self, Self::Error> {
        let stdout = String::from_utf8_lossy(&value.stdout);
        // yt-dlp prints one JSON document per line; only the first one matters here
        let first = stdout.lines().find(|line| !line.trim().is_empty()).unwrap_or("");
        Self::from_json(first)
    }
}
