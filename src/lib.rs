//! Tunes: a Discord bot with per-guild music playback and a few small
//! utility commands.

pub mod commands;
pub mod config;

#[cfg(feature = "music")]
pub use commands::music::{
    audio_sources::{AssetResolver, ResolutionError, ResolvedAsset, youtube::YtDlpResolver},
    utils::{
        playback_manager::PlaybackManager,
        queue_manager::{PlaybackPhase, QueueEntry, QueueRegistry},
        reply::ReplyTarget,
        voice_sink::{PlaybackSink, SinkError},
    },
};

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    /// Drives queued playback for every guild the bot is in.
    #[cfg(feature = "music")]
    pub playback: PlaybackManager,
    /// Volume new tracks start at.
    #[cfg(feature = "music")]
    pub default_volume: f32,
}
