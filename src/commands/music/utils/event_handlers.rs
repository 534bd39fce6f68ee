use poise::serenity_prelude as serenity;
use serenity::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, oneshot};
use tracing::debug;

/// Event handler for when a track ends or errors out.
///
/// Fires the completion signal handed out by the sink exactly once, no matter
/// how many of the registered events arrive.
#[derive(Clone)]
pub struct TrackEndNotifier {
    done: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl TrackEndNotifier {
    pub fn new(done: oneshot::Sender<()>) -> Self {
        Self {
            done: Arc::new(Mutex::new(Some(done))),
        }
    }

    async fn notify(&self) {
        if let Some(done) = self.done.lock().await.take() {
            // The controller may have been cancelled and dropped its receiver
            let _ = done.send(());
            debug!("Track finished, completion signalled");
        }
    }
}

#[async_trait]
impl songbird::EventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &songbird::EventContext<'_>) -> Option<songbird::Event> {
        if let songbird::EventContext::Track(_) = ctx {
            self.notify().await;
        }
        None
    }
}
