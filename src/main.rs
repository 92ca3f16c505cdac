use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod coordinator;
mod session;
mod ui;

use crate::audio::lavalink_client::LavalinkManager;
use crate::bot::{DiscordNotifier, MusicBot};
use crate::config::Config;
use crate::coordinator::{Coordinator, EventDispatcher, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("music_coordinator=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Music Coordinator v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!("{}", config.summary());

    let http = Arc::new(Http::new(&config.discord_token));
    let user_id = http.get_current_user().await?.id;

    // Songbird only relays voice credentials; Lavalink streams the audio
    let songbird = Songbird::serenity();

    info!("🎼 Connecting to Lavalink...");
    let (lavalink, events) = LavalinkManager::connect(&config, user_id, songbird.clone()).await?;
    info!("✅ Lavalink ready");

    let notifier = Arc::new(DiscordNotifier::new(http));
    let coordinator = Coordinator::new(Arc::new(lavalink), notifier, Settings::from(&config));
    tokio::spawn(EventDispatcher::new(coordinator.clone()).run(events));

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let handler = MusicBot::new(config.clone(), coordinator);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Could not listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing shards...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
