pub mod connect;
pub mod disconnect;
pub mod play;
pub mod queue;
pub mod skip;

pub mod audio_sources;
pub mod utils;

use crate::{CommandResult, Context};
use poise::serenity_prelude as serenity;

use utils::music_manager::MusicError;

/// Resolve the guild a command was invoked in
fn require_guild(ctx: &Context<'_>) -> Result<serenity::GuildId, crate::Error> {
    ctx.guild_id()
        .ok_or_else(|| Box::new(MusicError::NotInGuild) as crate::Error)
}
