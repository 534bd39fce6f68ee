//! The voice side of playback: a per-guild sink that streams one local file at a time.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::prelude::Mutex as SerenityMutex;
use songbird::Call;
use songbird::error::{ControlError, TrackResult};
use songbird::input::File as FileInput;
use songbird::tracks::TrackHandle;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::event_handlers::TrackEndNotifier;

/// Errors reported by a playback sink
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Track control failed: {0}")]
    Control(String),
}

/// Resolves once the stream started by [`PlaybackSink::play`] is over, whether it
/// ended naturally, was stopped, or the sink went away.
pub type PlaybackDone = oneshot::Receiver<()>;

/// Something that can stream a local audio file into a live voice session.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Whether the sink is still attached to a voice session.
    async fn is_active(&self) -> bool;

    /// Start streaming `file`. The returned receiver fires when the stream ends.
    async fn play(&self, file: &Path) -> Result<PlaybackDone, SinkError>;

    /// Stop the current stream. Must fire the same completion signal as a natural end.
    fn stop(&self) -> Result<(), SinkError>;
}

/// A `PlaybackSink` backed by a Songbird call.
pub struct SongbirdSink {
    call: Arc<SerenityMutex<Call>>,
    volume: f32,
    current: Mutex<Option<TrackHandle>>,
}

impl SongbirdSink {
    pub fn new(call: Arc<SerenityMutex<Call>>, volume: f32) -> Self {
        Self {
            call,
            volume,
            current: Mutex::new(None),
        }
    }
}

#[async_trait]
impl PlaybackSink for SongbirdSink {
    async fn is_active(&self) -> bool {
        self.call.lock().await.current_connection().is_some()
    }

    async fn play(&self, file: &Path) -> Result<PlaybackDone, SinkError> {
        let (done_tx, done_rx) = oneshot::channel();
        let input = FileInput::new(file.to_path_buf());

        let track = {
            let mut call = self.call.lock().await;
            if call.current_connection().is_none() {
                return Err(SinkError::NotConnected);
            }
            call.play_input(input.into())
        };

        if let Err(e) = track.set_volume(self.volume) {
            warn!("Failed to set volume on new track: {}", e);
        }

        let notifier = TrackEndNotifier::new(done_tx);
        for event in [songbird::TrackEvent::End, songbird::TrackEvent::Error] {
            track
                .add_event(songbird::Event::Track(event), notifier.clone())
                .map_err(|e| SinkError::Control(e.to_string()))?;
        }

        debug!("Streaming {}", file.display());
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(track);
        Ok(done_rx)
    }

    fn stop(&self) -> Result<(), SinkError> {
        let track = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match track {
            Some(track) => stop_outcome(track.stop()),
            None => Ok(()),
        }
    }
}

/// A track that already ended on its own counts as stopped.
fn stop_outcome(result: TrackResult<()>) -> Result<(), SinkError> {
    match result {
        Ok(()) | Err(ControlError::Finished) => Ok(()),
        Err(e) => Err(SinkError::Control(e.to_string())),
    }
}
