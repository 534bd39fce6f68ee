//! Runtime configuration, read from the environment (and a `.env` file if present).

use std::env;
use std::path::PathBuf;

use serenity::model::id::GuildId;
use thiserror::Error;

/// Errors raised while reading configuration values
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Everything the bot needs to know before connecting to Discord.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub discord_token: String,
    /// When set, slash commands are registered in this guild only.
    pub guild_id: Option<GuildId>,
    /// Directory that downloaded audio is written to.
    pub song_dir: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_path: Option<PathBuf>,
    pub audio_format: String,
    pub audio_quality: String,
    pub default_volume: f32,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat blank values the same as unset ones
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let discord_token = get("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;

        let guild_id = match get("GUILD_ID") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(id) if id > 0 => Some(GuildId::new(id)),
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "GUILD_ID",
                        value: raw,
                    });
                }
            },
            None => None,
        };

        let default_volume = match get("DEFAULT_VOLUME") {
            Some(raw) => match raw.trim().parse::<f32>() {
                Ok(volume) if (0.0..=2.0).contains(&volume) => volume,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DEFAULT_VOLUME",
                        value: raw,
                    });
                }
            },
            None => 0.5,
        };

        Ok(Self {
            discord_token,
            guild_id,
            song_dir: get("SONG_DIR").unwrap_or_else(|| "songs".into()).into(),
            ytdlp_path: get("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".into()),
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from),
            audio_format: get("AUDIO_FORMAT").unwrap_or_else(|| "mp3".into()),
            audio_quality: get("AUDIO_QUALITY").unwrap_or_else(|| "192K".into()),
            default_volume,
        })
    }
}
