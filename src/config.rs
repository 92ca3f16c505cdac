use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{env, str::FromStr};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Development guild for slash commands

    // Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,
    pub lavalink_ssl: bool,

    // Sessions
    pub idle_timeout_secs: u64,
    pub max_queue_size: usize,
    pub default_volume: u16,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            guild_id: env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            lavalink_host: env::var("LAVALINK_HOST").unwrap_or(defaults.lavalink_host),
            lavalink_port: parse_or("LAVALINK_PORT", defaults.lavalink_port)?,
            lavalink_password: env::var("LAVALINK_PASSWORD").unwrap_or(defaults.lavalink_password),
            lavalink_ssl: parse_or("LAVALINK_SSL", defaults.lavalink_ssl)?,

            idle_timeout_secs: parse_or("IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
            max_queue_size: parse_or("MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            default_volume: parse_or("DEFAULT_VOLUME", defaults.default_volume)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks that would otherwise surface as odd runtime behavior.
    ///
    /// - Idle timeout and queue size must be greater than 0
    /// - Default volume must be within the range `/volume` accepts (1-150)
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("Discord token must not be empty");
        }

        if self.idle_timeout_secs == 0 {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if !(1..=150).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 1 and 150, got: {}",
                self.default_volume
            );
        }

        Ok(())
    }

    /// Log-safe summary; never includes the token or the node password.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands in {}\n  \
            Lavalink: {}://{}:{}\n  \
            Sessions: {} idle timeout, {} queue, {}% vol",
            self.guild_id
                .map_or("all guilds".to_string(), |id| format!("guild {}", id)),
            if self.lavalink_ssl { "https" } else { "http" },
            self.lavalink_host,
            self.lavalink_port,
            humantime::format_duration(std::time::Duration::from_secs(self.idle_timeout_secs)),
            self.max_queue_size,
            self.default_volume,
        )
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e)),
        _ => Ok(default),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            lavalink_ssl: false,

            idle_timeout_secs: 600, // 10 minutes
            max_queue_size: 1000,
            default_volume: 100,
        }
    }
}
