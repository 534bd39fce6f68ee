use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::Mutex as SerenityMutex;
use songbird::{Call, Songbird};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::commands::music::audio_sources::ResolutionError;

use super::voice_sink::SinkError;

/// Errors that can occur during music operations
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("Invalid URL provided. Please provide a valid YouTube or YouTube Music link.")]
    InvalidUrl(String),

    #[error("Failed to fetch song info: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Not in a guild")]
    NotInGuild,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("Failed to get voice manager")]
    NoVoiceManager,

    #[error("You must be in a voice channel to play music!")]
    UserNotInVoiceChannel,

    #[error("Voice playback failed: {0}")]
    Sink(#[from] SinkError),

    #[error("I'm not in a voice channel.")]
    NotConnected,

    #[error("No song is currently playing!")]
    NothingPlaying,
}

/// Broad classes of `MusicError`, used to decide how a failure is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or unsupported input. Reported immediately and never enqueued.
    Validation,
    /// Metadata lookup or download failed.
    Resolution,
    /// Voice connection problems.
    Sink,
    /// The command makes no sense in the current state (e.g. skip while idle).
    State,
}

impl MusicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MusicError::InvalidUrl(_) => ErrorKind::Validation,
            MusicError::Resolution(ResolutionError::InvalidUrl(_)) => ErrorKind::Validation,
            MusicError::Resolution(_) => ErrorKind::Resolution,
            MusicError::NotInGuild
            | MusicError::JoinError(_)
            | MusicError::NoVoiceManager
            | MusicError::UserNotInVoiceChannel
            | MusicError::Sink(_) => ErrorKind::Sink,
            MusicError::NotConnected | MusicError::NothingPlaying => ErrorKind::State,
        }
    }
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Helpers for Songbird voice connections
pub struct MusicManager;

impl MusicManager {
    /// Get the Songbird voice client from the context
    pub async fn get_songbird(ctx: &Context) -> MusicResult<Arc<Songbird>> {
        songbird::get(ctx).await.ok_or(MusicError::NoVoiceManager)
    }

    /// Get the current voice channel call handle
    pub async fn get_call(
        ctx: &Context,
        guild_id: GuildId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;
        songbird.get(guild_id).ok_or(MusicError::NotConnected)
    }

    /// Join a voice channel
    pub async fn join_channel(
        ctx: &Context,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> MusicResult<Arc<SerenityMutex<Call>>> {
        let songbird = Self::get_songbird(ctx).await?;

        let handle = songbird.join(guild_id, channel_id).await.map_err(|e| {
            error!(
                "Failed to join voice channel {} for guild {}: {}",
                channel_id, guild_id, e
            );
            MusicError::JoinError(e.to_string())
        })?;

        info!("Joined voice channel {} in guild {}", channel_id, guild_id);
        Ok(handle)
    }

    /// Leave a voice channel
    pub async fn leave_channel(ctx: &Context, guild_id: GuildId) -> MusicResult<()> {
        let songbird = Self::get_songbird(ctx).await?;

        // Check if we're in a voice channel
        if songbird.get(guild_id).is_none() {
            return Err(MusicError::NotConnected);
        }

        songbird
            .remove(guild_id)
            .await
            .map_err(|_| MusicError::JoinError("Failed to leave voice channel".to_string()))?;

        info!("Left voice channel in guild {}", guild_id);
        Ok(())
    }

    /// Get the voice channel ID that the user is currently in
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: serenity::UserId,
    ) -> MusicResult<ChannelId> {
        let guild = ctx.cache.guild(guild_id).ok_or(MusicError::NotInGuild)?;

        let voice_state = guild
            .voice_states
            .get(&user_id)
            .ok_or(MusicError::UserNotInVoiceChannel)?;

        voice_state
            .channel_id
            .ok_or(MusicError::UserNotInVoiceChannel)
    }
}
