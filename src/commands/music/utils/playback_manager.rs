//! Drives the fetch → play → advance cycle for every guild.
//!
//! Each guild whose queue is non-empty has exactly one drive loop, started by
//! whoever wins the guild's playback slot. The loop runs on its own task, so a
//! slow download or a long track in one guild never holds up another.

use serenity::model::id::GuildId;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::music_manager::{MusicError, MusicResult};
use super::queue_manager::{
    GuildQueue, PlaybackPhase, QueueEntry, QueueRegistry, QueueSnapshot, SlotTicket, StreamStart,
};
use super::voice_sink::PlaybackSink;
use crate::commands::music::audio_sources::{AssetResolver, ResolvedAsset, TrackMetadata};

/// Schedules playback across guilds. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct PlaybackManager {
    registry: Arc<QueueRegistry>,
    resolver: Arc<dyn AssetResolver>,
}

impl PlaybackManager {
    pub fn new(resolver: Arc<dyn AssetResolver>) -> Self {
        Self::with_registry(Arc::new(QueueRegistry::new()), resolver)
    }

    pub fn with_registry(registry: Arc<QueueRegistry>, resolver: Arc<dyn AssetResolver>) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &QueueRegistry {
        &self.registry
    }

    pub fn validate(&self, url: &str) -> bool {
        self.resolver.validate(url)
    }

    /// Look up title/uploader for the confirmation message.
    pub async fn fetch_metadata(&self, url: &str) -> MusicResult<TrackMetadata> {
        if !self.resolver.validate(url) {
            return Err(MusicError::InvalidUrl(url.to_string()));
        }
        Ok(self.resolver.fetch_metadata(url).await?)
    }

    /// Queue a request and start the guild's loop if it is idle.
    ///
    /// Returns the position of the entry in the queue. `sink` is only used if
    /// this call starts a new loop; a running loop keeps its own sink.
    pub async fn enqueue(
        &self,
        guild_id: GuildId,
        entry: QueueEntry,
        sink: Arc<dyn PlaybackSink>,
    ) -> MusicResult<usize> {
        self.enqueue_confirmed(guild_id, entry, sink, |_| async {})
            .await
    }

    /// Like [`enqueue`](Self::enqueue), but runs `confirm` with the queue
    /// position before a newly started loop may announce anything, so the
    /// requester sees their confirmation ahead of "Now playing".
    pub async fn enqueue_confirmed<F, Fut>(
        &self,
        guild_id: GuildId,
        entry: QueueEntry,
        sink: Arc<dyn PlaybackSink>,
        confirm: F,
    ) -> MusicResult<usize>
    where
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = ()>,
    {
        if !self.resolver.validate(entry.url()) {
            return Err(MusicError::InvalidUrl(entry.url().to_string()));
        }

        let queue = self.registry.queue(guild_id);
        let (position, ticket) = queue.enqueue_and_acquire(entry).await;

        // Dropping the sender opens the gate too, so a cancelled command
        // cannot leave the loop waiting forever
        let gate = ticket.map(|ticket| {
            info!("Starting playback loop for guild {}", guild_id);
            let (open, gate) = oneshot::channel();
            self.spawn_loop(queue, ticket, sink, gate);
            open
        });

        confirm(position).await;
        if let Some(open) = gate {
            let _ = open.send(());
        }

        Ok(position)
    }

    /// Stop the current track. The loop moves on to the next entry by itself.
    pub async fn skip(&self, guild_id: GuildId) -> MusicResult<()> {
        match self.registry.get(guild_id) {
            Some(queue) => queue.skip().await,
            None => Err(MusicError::NothingPlaying),
        }
    }

    /// Abandon the current entry, clear the queue and go idle.
    /// Returns the number of queued entries that were discarded.
    pub async fn disconnect(&self, guild_id: GuildId) -> usize {
        match self.registry.get(guild_id) {
            Some(queue) => queue.disconnect().await,
            None => 0,
        }
    }

    pub async fn phase(&self, guild_id: GuildId) -> PlaybackPhase {
        self.registry.phase(guild_id).await
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        match self.registry.get(guild_id) {
            Some(queue) => Some(queue.snapshot().await),
            None => None,
        }
    }

    /// Run the drive loop on its own task, with a supervisor that frees the
    /// slot if the loop dies unexpectedly.
    fn spawn_loop(
        &self,
        queue: Arc<GuildQueue>,
        ticket: SlotTicket,
        sink: Arc<dyn PlaybackSink>,
        gate: oneshot::Receiver<()>,
    ) {
        let resolver = Arc::clone(&self.resolver);
        let supervised = Arc::clone(&queue);

        tokio::spawn(async move {
            let driver = tokio::spawn(async move {
                let _ = gate.await;
                drive(queue, resolver, sink, ticket).await
            });
            if let Err(e) = driver.await {
                error!(
                    "Playback loop for guild {} crashed: {}",
                    supervised.guild_id(),
                    e
                );
                supervised.abandon(ticket).await;
            }
        });
    }
}

/// The per-guild state machine: Draining → Resolving → Playing → Draining ... → Idle.
async fn drive(
    queue: Arc<GuildQueue>,
    resolver: Arc<dyn AssetResolver>,
    sink: Arc<dyn PlaybackSink>,
    ticket: SlotTicket,
) {
    let guild_id = queue.guild_id();

    // Draining: take the next entry or release the slot in the same step
    while let Some(entry) = queue.next_or_release(ticket).await {
        // Resolving
        let asset = match resolver.download(entry.url()).await {
            Ok(asset) => asset,
            Err(e) => {
                // Skipped without telling the channel
                warn!(
                    "Skipping {} in guild {}, download failed: {}",
                    entry.url(),
                    guild_id,
                    e
                );
                queue.finish_playback(ticket).await;
                continue;
            }
        };

        if !queue.is_current(ticket).await {
            info!("Playback in guild {} was cancelled during download", guild_id);
            return;
        }

        if !sink.is_active().await {
            warn!("Voice sink for guild {} is gone", guild_id);
            queue.abandon(ticket).await;
            return;
        }

        let done = match queue
            .start_streaming(ticket, &sink, &asset, entry.requested_by())
            .await
        {
            StreamStart::Started(done) => {
                announce(&entry, &asset).await;
                done
            }
            StreamStart::Cancelled => return,
            StreamStart::Failed(e) => {
                warn!("Voice sink for guild {} failed to play: {}", guild_id, e);
                queue.abandon(ticket).await;
                return;
            }
        };

        // Playing: natural end, skip and disconnect all land here
        let _ = done.await;
        info!("Finished '{}' in guild {}", asset.title(), guild_id);
        drop(asset);

        queue.finish_playback(ticket).await;
    }
}

async fn announce(entry: &QueueEntry, asset: &ResolvedAsset) {
    let message = now_playing_message(asset.title(), asset.uploader(), entry.requested_by());
    if let Err(e) = entry.reply().send_text(&message).await {
        warn!("Failed to send now playing message: {}", e);
    }
}

pub fn now_playing_message(title: &str, uploader: &str, requested_by: &str) -> String {
    format!(
        "Now playing: **{}** by **{}** (requested by {})",
        title, uploader, requested_by
    )
}
