use super::*;
use rand::seq::IndexedRandom;

const ANIMALS: [&str; 10] = ["🐶", "🐱", "🐭", "🦁", "🐯", "🐸", "🐼", "🐧", "🐨", "🐰"];

/// Send a random animal emoji
#[poise::command(slash_command, category = "General")]
pub async fn animal(ctx: Context<'_>) -> CommandResult {
    ctx.defer().await?;

    let animal = random_animal();
    ctx.say(format!("Here is a random animal: {}", animal))
        .await?;

    Ok(())
}

fn random_animal() -> &'static str {
    ANIMALS.choose(&mut rand::rng()).copied().unwrap_or("🐶")
}
