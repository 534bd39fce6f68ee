use super::*;
use crate::commands::music::utils::{embedded_messages, music_manager::MusicManager};
use ::serenity::model::mention::Mentionable;
use tracing::{info, warn};

/// Make the bot join your voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn connect(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_guild(&ctx)?;

    let channel_id = match MusicManager::get_user_voice_channel(
        ctx.serenity_context(),
        guild_id,
        ctx.author().id,
    ) {
        Ok(channel_id) => channel_id,
        Err(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
            return Ok(());
        }
    };

    ctx.defer().await?;

    // Moving to a new channel drops whatever was queued for the old one
    if MusicManager::get_call(ctx.serenity_context(), guild_id)
        .await
        .is_ok()
    {
        let cleared = ctx.data().playback.disconnect(guild_id).await;
        info!(
            "Leaving current voice channel in guild {} ({} queued songs dropped)",
            guild_id, cleared
        );
        if let Err(e) = MusicManager::leave_channel(ctx.serenity_context(), guild_id).await {
            warn!("Failed to leave previous voice channel: {}", e);
        }
    }

    match MusicManager::join_channel(ctx.serenity_context(), guild_id, channel_id).await {
        Ok(_) => {
            ctx.send(embedded_messages::joined_voice_channel(
                channel_id.mention().to_string(),
            ))
            .await?;
        }
        Err(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
        }
    }

    Ok(())
}
