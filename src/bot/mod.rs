//! # Bot Module
//!
//! Discord front end of the music coordinator.
//!
//! - Slash command registration ([`commands`])
//! - Interaction dispatch and rendering ([`handlers`])
//! - Channel notices from the coordinator ([`notifier`])
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. It owns no playback
//! state: every command is forwarded to the shared [`Coordinator`], and the
//! reply or error it returns is rendered as an embed. Voice connections are
//! made by the audio backend through songbird, so the bot only watches its
//! own voice state to notice when someone else disconnects it.

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{config::Config, coordinator::Coordinator};

pub use notifier::DiscordNotifier;

pub struct MusicBot {
    config: Arc<Config>,
    pub coordinator: Coordinator,
}

impl MusicBot {
    pub fn new(config: Config, coordinator: Coordinator) -> Self {
        Self {
            config: Arc::new(config),
            coordinator,
        }
    }

    /// Registers slash commands, per guild when `GUILD_ID` is set (instant
    /// propagation) and globally otherwise.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not a member of guild {}, skipping registration", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Guild command registration failed: {:?}", e);
                        anyhow::anyhow!("Could not register guild commands. Check the 'applications.commands' scope.")
                    })?;
                info!("✅ Commands registered for guild {}", guild_id);
            }
            None => {
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Global command registration failed: {:?}", e);
                    anyhow::anyhow!("Could not register global commands. Check the 'applications.commands' scope.")
                })?;
                info!("✅ Global commands registered");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error registering commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                error!("Error handling command: {:?}", e);
            }
        }
    }

    /// Tears the session down when the bot is kicked or its channel is
    /// deleted. Disconnects the coordinator made itself find no session and
    /// are ignored.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }

        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                self.coordinator.handle_voice_disconnect(guild_id).await;
            }
        }
    }
}
