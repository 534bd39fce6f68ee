use super::*;
use poise::serenity_prelude as serenity;
use tracing::warn;

const OPTION_EMOJIS: [&str; 4] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣"];

/// Build the poll message text from the question and the non-empty options
pub fn format_poll(question: &str, options: &[&str]) -> String {
    let lines: Vec<String> = options
        .iter()
        .enumerate()
        .map(|(index, option)| format!("{}. {}", index + 1, option))
        .collect();

    format!("**Poll:** {}\n{}", question, lines.join("\n"))
}

/// Create a poll with reactions for voting
#[poise::command(slash_command, category = "General")]
pub async fn poll(
    ctx: Context<'_>,
    #[description = "What to vote on"] question: String,
    #[description = "First option"] option_1: String,
    #[description = "Second option"] option_2: String,
    #[description = "Third option"] option_3: Option<String>,
    #[description = "Fourth option"] option_4: Option<String>,
) -> CommandResult {
    let options: Vec<&str> = [
        Some(option_1.as_str()),
        Some(option_2.as_str()),
        option_3.as_deref(),
        option_4.as_deref(),
    ]
    .into_iter()
    .flatten()
    .filter(|option| !option.trim().is_empty())
    .collect();

    if options.len() < 2 {
        ctx.send(
            poise::CreateReply::default()
                .content("You need at least two options for the poll!")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    let handle = ctx.say(format_poll(&question, &options)).await?;
    let message = handle.message().await?;

    for emoji in OPTION_EMOJIS.iter().take(options.len()) {
        let reaction = serenity::ReactionType::Unicode(emoji.to_string());
        if let Err(e) = message.react(ctx, reaction).await {
            warn!("Failed to add poll reaction {}: {}", emoji, e);
        }
    }

    Ok(())
}
