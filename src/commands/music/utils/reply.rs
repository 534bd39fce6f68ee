//! Where "now playing" announcements are delivered.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::ChannelId;
use std::sync::Arc;

use crate::Error;

/// An opaque destination for text sent on behalf of a queued request.
#[async_trait]
pub trait ReplyTarget: Send + Sync {
    async fn send_text(&self, content: &str) -> Result<(), Error>;
}

/// Replies into a Discord text channel.
pub struct ChannelReply {
    http: Arc<serenity::Http>,
    channel_id: ChannelId,
}

impl ChannelReply {
    pub fn new(http: Arc<serenity::Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl ReplyTarget for ChannelReply {
    async fn send_text(&self, content: &str) -> Result<(), Error> {
        self.channel_id.say(&self.http, content).await?;
        Ok(())
    }
}
