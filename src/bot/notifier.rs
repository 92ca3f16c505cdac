use async_trait::async_trait;
use serenity::{
    builder::CreateMessage,
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    coordinator::{Notice, Notifier},
    ui::embeds,
};

/// Posts coordinator notices as embeds in the channel `/join` was used from.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, guild_id: GuildId, channel_id: Option<ChannelId>, notice: Notice) {
        let Some(channel_id) = channel_id else {
            warn!("No session channel in guild {}, notice not posted: {:?}", guild_id, notice);
            return;
        };

        let message = CreateMessage::new().embed(embeds::notice_embed(&notice));
        if let Err(e) = channel_id.send_message(&self.http, message).await {
            warn!("Could not post notice in guild {}: {:?}", guild_id, e);
        }
    }
}
