use super::*;
use crate::commands::music::utils::embedded_messages;
use tracing::info;

/// Skip the currently playing song
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn skip(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_guild(&ctx)?;

    match ctx.data().playback.skip(guild_id).await {
        Ok(()) => {
            info!("{} skipped a track in guild {}", ctx.author().name, guild_id);
            ctx.send(embedded_messages::skipped()).await?;
        }
        Err(err) => {
            ctx.send(embedded_messages::music_error(&err)).await?;
        }
    }

    Ok(())
}
