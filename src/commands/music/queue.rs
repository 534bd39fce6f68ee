use super::*;
use crate::commands::music::utils::embedded_messages;

/// View the current music queue
#[poise::command(slash_command, guild_only, category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = require_guild(&ctx)?;

    let snapshot = ctx.data().playback.snapshot(guild_id).await;
    ctx.send(embedded_messages::music_queue(snapshot.as_ref()))
        .await?;

    Ok(())
}
