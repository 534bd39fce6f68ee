//! Defines the `/roll` command for rolling dice in `NdN` notation.

use super::*;
use rand::Rng;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static DICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,3})\s*[dD]\s*(\d{1,4})\s*$").unwrap());

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;

/// Errors that can occur while parsing dice notation
#[derive(Error, Debug, PartialEq)]
pub enum DiceError {
    #[error("Format must be in NdN format (e.g. 2d6)")]
    BadFormat,

    #[error("You can roll between 1 and {} dice", MAX_DICE)]
    TooManyDice,

    #[error("Dice need between 1 and {} sides", MAX_SIDES)]
    BadSides,
}

/// Parse `NdN` notation into (number of dice, number of sides).
pub fn parse_dice(dice: &str) -> Result<(u32, u32), DiceError> {
    let captures = DICE_REGEX.captures(dice).ok_or(DiceError::BadFormat)?;
    let rolls: u32 = captures[1].parse().map_err(|_| DiceError::BadFormat)?;
    let sides: u32 = captures[2].parse().map_err(|_| DiceError::BadFormat)?;

    if rolls == 0 || rolls > MAX_DICE {
        return Err(DiceError::TooManyDice);
    }
    if sides == 0 || sides > MAX_SIDES {
        return Err(DiceError::BadSides);
    }

    Ok((rolls, sides))
}

fn roll_dice(rolls: u32, sides: u32) -> Vec<u32> {
    let mut rng = rand::rng();
    (0..rolls).map(|_| rng.random_range(1..=sides)).collect()
}

/// Roll dice in NdN format (e.g. 2d6)
#[poise::command(slash_command, category = "General")]
pub async fn roll(
    ctx: Context<'_>,
    #[description = "Dice in NdN format"] dice: Option<String>,
) -> CommandResult {
    let dice = dice.unwrap_or_else(|| "1d6".to_string());

    let (rolls, sides) = match parse_dice(&dice) {
        Ok(parsed) => parsed,
        Err(err) => {
            ctx.say(err.to_string()).await?;
            return Ok(());
        }
    };

    let result = roll_dice(rolls, sides)
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    ctx.say(format!("{} rolled: {}", ctx.author().name, result))
        .await?;

    Ok(())
}
