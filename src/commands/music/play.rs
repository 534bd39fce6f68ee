use super::*;
use crate::commands::music::utils::{
    embedded_messages,
    music_manager::{MusicManager, MusicResult},
    queue_manager::QueueEntry,
    reply::ChannelReply,
    voice_sink::{PlaybackSink, SongbirdSink},
};
use ::serenity::prelude::Mutex as SerenityMutex;
use songbird::Call;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Play a song from a YouTube or YouTube Music URL
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "YouTube or YouTube Music URL"] url: String,
) -> CommandResult {
    info!("Received play command with url: {}", url);
    let guild_id = require_guild(&ctx)?;
    let playback = &ctx.data().playback;

    // Reject bad URLs before touching the network
    if !playback.validate(&url) {
        let err = MusicError::InvalidUrl(url);
        ctx.send(embedded_messages::music_error(&err)).await?;
        return Ok(());
    }

    // Defer the response since joining and metadata lookup might take time
    ctx.defer().await?;

    let existing = MusicManager::get_call(ctx.serenity_context(), guild_id).await;
    let call = match voice_step(existing) {
        VoiceStep::Use(call) => call,
        VoiceStep::JoinInvoker => match join_invoker(ctx).await {
            Ok(call) => call,
            Err(err) => {
                ctx.send(embedded_messages::music_error(&err)).await?;
                return Ok(());
            }
        },
        VoiceStep::Fail(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
            return Ok(());
        }
    };

    let metadata = match playback.fetch_metadata(&url).await {
        Ok(metadata) => metadata,
        Err(err) => {
            error!("Failed to fetch song info for {}: {}", url, err);
            ctx.send(embedded_messages::music_error(&err)).await?;
            return Ok(());
        }
    };

    let requested_by = ctx
        .author_member()
        .await
        .map(|member| member.display_name().to_string())
        .unwrap_or_else(|| ctx.author().name.clone());

    let reply = Arc::new(ChannelReply::new(
        ctx.serenity_context().http.clone(),
        ctx.channel_id(),
    ));
    let entry = QueueEntry::new(url, requested_by.clone(), reply).with_metadata(metadata.clone());
    let sink: Arc<dyn PlaybackSink> = Arc::new(SongbirdSink::new(call, ctx.data().default_volume));

    let confirm = |position: usize| async move {
        let reply = embedded_messages::added_to_queue(&metadata, &requested_by, position);
        if let Err(e) = ctx.send(reply).await {
            warn!("Failed to confirm queued song: {}", e);
        }
    };

    if let Err(err) = playback
        .enqueue_confirmed(guild_id, entry, sink, confirm)
        .await
    {
        ctx.send(embedded_messages::music_error(&err)).await?;
    }

    Ok(())
}

/// How `/play` gets hold of a voice call.
#[derive(Debug)]
enum VoiceStep<T> {
    /// The bot is already connected; the invoker may be anywhere.
    Use(T),
    /// Not connected yet, so follow the invoker into their channel.
    JoinInvoker,
    Fail(MusicError),
}

fn voice_step<T>(existing: MusicResult<T>) -> VoiceStep<T> {
    match existing {
        Ok(call) => VoiceStep::Use(call),
        Err(MusicError::NotConnected) => VoiceStep::JoinInvoker,
        Err(err) => VoiceStep::Fail(err),
    }
}

/// Join the voice channel the invoking user is in.
async fn join_invoker(ctx: Context<'_>) -> MusicResult<Arc<SerenityMutex<Call>>> {
    let guild_id = ctx.guild_id().ok_or(MusicError::NotInGuild)?;
    let channel_id =
        MusicManager::get_user_voice_channel(ctx.serenity_context(), guild_id, ctx.author().id)?;
    MusicManager::join_channel(ctx.serenity_context(), guild_id, channel_id).await
}
