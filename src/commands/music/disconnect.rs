use super::*;
use crate::commands::music::utils::{
    embedded_messages,
    music_manager::{MusicError, MusicManager},
};

/// Make the bot leave the voice channel
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn disconnect(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_guild(&ctx)?;

    if let Err(err) = MusicManager::get_call(ctx.serenity_context(), guild_id).await {
        ctx.send(embedded_messages::music_error(&err)).await?;
        return Ok(());
    }

    // Cancel pending work first so nothing auto-advances onto a dying call
    let cleared = ctx.data().playback.disconnect(guild_id).await;

    match MusicManager::leave_channel(ctx.serenity_context(), guild_id).await {
        Ok(()) | Err(MusicError::NotConnected) => {
            ctx.send(embedded_messages::left_voice_channel(cleared))
                .await?;
        }
        Err(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
        }
    }

    Ok(())
}
