//! This module aggregates all the command modules for the bot.

/// General purpose commands (e.g., hello, roll, poll).
pub mod general;

/// Commands related to music playback (requires the `music` feature).
#[cfg(feature = "music")]
pub mod music;
