use super::*;

/// Say hello to the user
#[poise::command(slash_command, category = "General")]
pub async fn hello(ctx: Context<'_>) -> CommandResult {
    ctx.say(format!("Hello, {}!", ctx.author().name)).await?;
    Ok(())
}
