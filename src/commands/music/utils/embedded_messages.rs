use poise::CreateReply;
use poise::serenity_prelude as serenity;
use serenity::all::CreateEmbed;

use super::{
    format_duration,
    music_manager::{ErrorKind, MusicError},
    queue_manager::QueueSnapshot,
};
use crate::commands::music::audio_sources::TrackMetadata;

/// How many pending entries the queue embed lists before summarising the rest
const QUEUE_PAGE_SIZE: usize = 10;

/// Create an embed for when a song is added to the queue
pub fn added_to_queue(metadata: &TrackMetadata, requested_by: &str, position: usize) -> CreateReply {
    let mut embed = CreateEmbed::new()
        .title("🎶 Added to Queue")
        .description(format!(
            "**{}** by **{}** (requested by {})",
            metadata.title, metadata.uploader, requested_by
        ))
        .field("Position", format!("`#{}`", position), true)
        .color(0x00ff00);

    if let Some(duration) = metadata.duration {
        embed = embed.field("Duration", format!("`{}`", format_duration(duration)), true);
    }

    if let Some(thumbnail) = &metadata.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    CreateReply::default().embed(embed)
}

/// Create an embed describing a failed music command
pub fn music_error(err: &MusicError) -> CreateReply {
    let (title, color) = match err.kind() {
        ErrorKind::State => ("⚠️ Nothing to do", 0xffa500),
        ErrorKind::Validation | ErrorKind::Resolution | ErrorKind::Sink => ("❌ Error", 0xff0000),
    };

    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title(title)
                .description(err.to_string())
                .color(color),
        )
        .ephemeral(true)
}

pub fn skipped() -> CreateReply {
    CreateReply::default().content("⏭ Skipping the current song!")
}

pub fn joined_voice_channel(channel: String) -> CreateReply {
    CreateReply::default().content(format!("Joined {}!", channel))
}

pub fn left_voice_channel(cleared: usize) -> CreateReply {
    let content = match cleared {
        0 => "Disconnected from the voice channel.".to_string(),
        1 => "Disconnected from the voice channel and cleared 1 queued song.".to_string(),
        n => format!("Disconnected from the voice channel and cleared {} queued songs.", n),
    };
    CreateReply::default().content(content)
}

/// Build the text listing for the queue embed
pub fn queue_description(snapshot: &QueueSnapshot) -> String {
    let mut lines = Vec::new();

    match &snapshot.now_playing {
        Some(now) => lines.push(format!(
            "**Now playing:** {} by {} (requested by {})",
            now.title, now.uploader, now.requested_by
        )),
        None => lines.push("**Now playing:** nothing".to_string()),
    }

    if snapshot.pending.is_empty() {
        lines.push("The queue is empty.".to_string());
        return lines.join("\n");
    }

    lines.push(String::new());
    for (index, entry) in snapshot.pending.iter().take(QUEUE_PAGE_SIZE).enumerate() {
        let title = entry
            .metadata()
            .map(|metadata| metadata.title.as_str())
            .unwrap_or(entry.url());
        lines.push(format!(
            "`{}.` {} (requested by {})",
            index + 1,
            title,
            entry.requested_by()
        ));
    }

    if snapshot.pending.len() > QUEUE_PAGE_SIZE {
        lines.push(format!(
            "...and {} more",
            snapshot.pending.len() - QUEUE_PAGE_SIZE
        ));
    }

    lines.join("\n")
}

/// Create an embed for the music queue
pub fn music_queue(snapshot: Option<&QueueSnapshot>) -> CreateReply {
    let description = match snapshot {
        Some(snapshot) => queue_description(snapshot),
        None => "The queue is empty.".to_string(),
    };

    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎵 Music Queue")
            .description(description)
            .color(0x00ff00),
    )
}
