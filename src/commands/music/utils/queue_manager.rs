use super::music_manager::{MusicError, MusicResult};
use super::reply::ReplyTarget;
use super::voice_sink::{PlaybackDone, PlaybackSink, SinkError};
use crate::commands::music::audio_sources::{ResolvedAsset, TrackMetadata};
use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// One pending play request. Immutable once created.
#[derive(Clone)]
pub struct QueueEntry {
    url: String,
    requested_by: String,
    reply: Arc<dyn ReplyTarget>,
    metadata: Option<TrackMetadata>,
}

impl QueueEntry {
    pub fn new(
        url: impl Into<String>,
        requested_by: impl Into<String>,
        reply: Arc<dyn ReplyTarget>,
    ) -> Self {
        Self {
            url: url.into(),
            requested_by: requested_by.into(),
            reply,
            metadata: None,
        }
    }

    /// Attach metadata fetched when the request was confirmed.
    pub fn with_metadata(mut self, metadata: TrackMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requested_by(&self) -> &str {
        &self.requested_by
    }

    pub fn reply(&self) -> &Arc<dyn ReplyTarget> {
        &self.reply
    }

    pub fn metadata(&self) -> Option<&TrackMetadata> {
        self.metadata.as_ref()
    }
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEntry")
            .field("url", &self.url)
            .field("requested_by", &self.requested_by)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Where a guild's playback loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    /// No loop is running for this guild.
    Idle,
    /// Downloading the entry that was just dequeued.
    Resolving,
    /// Streaming an asset to the sink.
    Playing,
    /// Between songs, about to look at the queue again.
    Draining,
}

/// What is on air right now, for display purposes.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub title: String,
    pub uploader: String,
    pub requested_by: String,
}

/// A point-in-time copy of a guild's queue.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub phase: PlaybackPhase,
    pub now_playing: Option<NowPlaying>,
    pub pending: Vec<QueueEntry>,
}

/// Proof that the holder owns a guild's playback slot.
///
/// Every acquisition gets a fresh epoch, so a loop whose slot was taken away
/// (by a disconnect) can tell that it is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTicket {
    epoch: u64,
}

/// Outcome of handing an asset to the sink.
pub enum StreamStart {
    /// Streaming began; the receiver fires when it ends.
    Started(PlaybackDone),
    /// The slot was taken away while the asset was being resolved.
    Cancelled,
    /// The sink could not play.
    Failed(SinkError),
}

struct GuildState {
    entries: VecDeque<QueueEntry>,
    playing: bool,
    phase: PlaybackPhase,
    epoch: u64,
    sink: Option<Arc<dyn PlaybackSink>>,
    now_playing: Option<NowPlaying>,
}

impl GuildState {
    fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            playing: false,
            phase: PlaybackPhase::Idle,
            epoch: 0,
            sink: None,
            now_playing: None,
        }
    }

    fn enqueue(&mut self, entry: QueueEntry) -> usize {
        self.entries.push_back(entry);
        self.entries.len()
    }

    fn dequeue_next(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    fn try_acquire_playback_slot(&mut self) -> Option<SlotTicket> {
        if self.playing {
            return None;
        }
        self.playing = true;
        self.epoch += 1;
        self.phase = PlaybackPhase::Draining;
        Some(SlotTicket { epoch: self.epoch })
    }

    fn release_playback_slot(&mut self) {
        self.playing = false;
        self.phase = PlaybackPhase::Idle;
        self.sink = None;
        self.now_playing = None;
    }

    fn is_current(&self, ticket: SlotTicket) -> bool {
        self.playing && self.epoch == ticket.epoch
    }
}

/// Playback state for a single guild: its FIFO of requests plus the playback slot.
///
/// Queue contents and the slot share one lock, so "queue is empty" and
/// "release the slot" always happen as a single step.
pub struct GuildQueue {
    guild_id: GuildId,
    state: Mutex<GuildState>,
}

impl GuildQueue {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            state: Mutex::new(GuildState::new()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Append an entry, returning the queue length after insertion.
    pub async fn enqueue(&self, entry: QueueEntry) -> usize {
        let position = self.state.lock().await.enqueue(entry);
        debug!("Queued entry #{} for guild {}", position, self.guild_id);
        position
    }

    /// Remove and return the oldest entry.
    pub async fn dequeue_next(&self) -> Option<QueueEntry> {
        self.state.lock().await.dequeue_next()
    }

    /// Claim the playback slot if nobody holds it.
    pub async fn try_acquire_playback_slot(&self) -> Option<SlotTicket> {
        self.state.lock().await.try_acquire_playback_slot()
    }

    /// Give the slot back unconditionally.
    pub async fn release_playback_slot(&self) {
        self.state.lock().await.release_playback_slot();
        debug!("Released playback slot for guild {}", self.guild_id);
    }

    /// Append an entry and, in the same step, try to claim the slot.
    ///
    /// Returns the queue position and a ticket if the caller must start a loop.
    pub async fn enqueue_and_acquire(&self, entry: QueueEntry) -> (usize, Option<SlotTicket>) {
        let mut state = self.state.lock().await;
        let position = state.enqueue(entry);
        let ticket = state.try_acquire_playback_slot();
        debug!(
            "Queued entry #{} for guild {} (start loop: {})",
            position,
            self.guild_id,
            ticket.is_some()
        );
        (position, ticket)
    }

    /// The draining step: hand out the next entry, or release the slot if the
    /// queue is empty. Returns `None` when the loop must stop.
    pub async fn next_or_release(&self, ticket: SlotTicket) -> Option<QueueEntry> {
        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return None;
        }

        match state.dequeue_next() {
            Some(entry) => {
                state.phase = PlaybackPhase::Resolving;
                Some(entry)
            }
            None => {
                state.release_playback_slot();
                info!("Queue empty for guild {}, going idle", self.guild_id);
                None
            }
        }
    }

    /// Start streaming `asset` on `sink`, unless the slot was taken away meanwhile.
    ///
    /// The guild lock is held while the sink starts, so a skip cannot slip in
    /// between "phase is Playing" and "the stream exists".
    pub async fn start_streaming(
        &self,
        ticket: SlotTicket,
        sink: &Arc<dyn PlaybackSink>,
        asset: &ResolvedAsset,
        requested_by: &str,
    ) -> StreamStart {
        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return StreamStart::Cancelled;
        }

        match sink.play(asset.path()).await {
            Ok(done) => {
                state.phase = PlaybackPhase::Playing;
                state.sink = Some(Arc::clone(sink));
                state.now_playing = Some(NowPlaying {
                    title: asset.title().to_string(),
                    uploader: asset.uploader().to_string(),
                    requested_by: requested_by.to_string(),
                });
                StreamStart::Started(done)
            }
            Err(e) => StreamStart::Failed(e),
        }
    }

    /// Leave `Playing` (or `Resolving`) for `Draining`.
    pub async fn finish_playback(&self, ticket: SlotTicket) {
        let mut state = self.state.lock().await;
        if state.is_current(ticket) {
            state.phase = PlaybackPhase::Draining;
            state.sink = None;
            state.now_playing = None;
        }
    }

    /// Drop everything still queued and release the slot held by `ticket`.
    /// Returns the number of entries discarded.
    pub async fn abandon(&self, ticket: SlotTicket) -> usize {
        let mut state = self.state.lock().await;
        if !state.is_current(ticket) {
            return 0;
        }
        let cleared = state.entries.len();
        state.entries.clear();
        state.release_playback_slot();
        warn!(
            "Abandoned playback for guild {}, discarded {} queued entries",
            self.guild_id, cleared
        );
        cleared
    }

    /// Stop the current stream. Only valid while `Playing`.
    pub async fn skip(&self) -> MusicResult<()> {
        let state = self.state.lock().await;
        match (&state.phase, &state.sink) {
            (PlaybackPhase::Playing, Some(sink)) => {
                sink.stop()?;
                info!("Skipped current track in guild {}", self.guild_id);
                Ok(())
            }
            _ => Err(MusicError::NothingPlaying),
        }
    }

    /// Cancel all pending work: clear the queue, stop the stream and release the slot.
    /// Returns the number of entries discarded.
    pub async fn disconnect(&self) -> usize {
        let mut state = self.state.lock().await;
        let cleared = state.entries.len();
        state.entries.clear();

        if let Some(sink) = state.sink.take() {
            if let Err(e) = sink.stop() {
                warn!("Failed to stop stream for guild {}: {}", self.guild_id, e);
            }
        }

        state.release_playback_slot();
        info!(
            "Disconnected guild {}, discarded {} queued entries",
            self.guild_id, cleared
        );
        cleared
    }

    pub async fn is_current(&self, ticket: SlotTicket) -> bool {
        self.state.lock().await.is_current(ticket)
    }

    pub async fn phase(&self) -> PlaybackPhase {
        self.state.lock().await.phase
    }

    pub async fn is_playing(&self) -> bool {
        self.state.lock().await.playing
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            phase: state.phase,
            now_playing: state.now_playing.clone(),
            pending: state.entries.iter().cloned().collect(),
        }
    }
}

/// Maps guilds to their queues. Queues are created on first use and live as long
/// as the registry does.
#[derive(Default)]
pub struct QueueRegistry {
    queues: DashMap<GuildId, Arc<GuildQueue>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the queue for a guild, creating it if absent.
    pub fn queue(&self, guild_id: GuildId) -> Arc<GuildQueue> {
        Arc::clone(
            self.queues
                .entry(guild_id)
                .or_insert_with(|| Arc::new(GuildQueue::new(guild_id)))
                .value(),
        )
    }

    /// Get the queue for a guild without creating one.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildQueue>> {
        self.queues.get(&guild_id).map(|queue| Arc::clone(queue.value()))
    }

    pub fn guild_count(&self) -> usize {
        self.queues.len()
    }

    /// Append an entry to a guild's queue, returning its length after insertion.
    pub async fn enqueue(&self, guild_id: GuildId, entry: QueueEntry) -> usize {
        self.queue(guild_id).enqueue(entry).await
    }

    /// Remove and return the oldest entry of a guild's queue.
    pub async fn dequeue_next(&self, guild_id: GuildId) -> Option<QueueEntry> {
        match self.get(guild_id) {
            Some(queue) => queue.dequeue_next().await,
            None => None,
        }
    }

    /// Atomically claim a guild's playback slot.
    pub async fn try_acquire_playback_slot(&self, guild_id: GuildId) -> bool {
        self.queue(guild_id).try_acquire_playback_slot().await.is_some()
    }

    pub async fn release_playback_slot(&self, guild_id: GuildId) {
        if let Some(queue) = self.get(guild_id) {
            queue.release_playback_slot().await;
        }
    }

    pub async fn phase(&self, guild_id: GuildId) -> PlaybackPhase {
        match self.get(guild_id) {
            Some(queue) => queue.phase().await,
            None => PlaybackPhase::Idle,
        }
    }

    pub async fn len(&self, guild_id: GuildId) -> usize {
        match self.get(guild_id) {
            Some(queue) => queue.len().await,
            None => 0,
        }
    }
}
