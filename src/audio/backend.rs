//! Boundary between the session coordinator and the remote audio node.

use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::{ChannelId, GuildId};

use crate::audio::{
    effects::FilterSpec,
    track::{SearchResult, TrackRef},
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("voice connection failed: {0}")]
    Voice(String),
    #[error("request to the audio node failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("audio node rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("failed to load track: {0}")]
    Load(String),
}

/// Why the backend reports a track as ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackEndReason {
    Finished,
    LoadFailed,
    Stopped,
    Replaced,
    Cleanup,
}

impl TrackEndReason {
    /// Only natural ends advance the queue; the rest are driven by commands.
    pub fn advances_queue(self) -> bool {
        matches!(self, TrackEndReason::Finished | TrackEndReason::LoadFailed)
    }
}

/// Lifecycle event emitted by the backend for one guild.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    TrackStarted {
        guild_id: GuildId,
        track: TrackRef,
    },
    TrackEnded {
        guild_id: GuildId,
        track: TrackRef,
        reason: TrackEndReason,
    },
}

impl PlaybackEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            PlaybackEvent::TrackStarted { guild_id, .. } => *guild_id,
            PlaybackEvent::TrackEnded { guild_id, .. } => *guild_id,
        }
    }
}

/// Control channel of the audio node. All calls are network round-trips.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<(), BackendError>;

    async fn leave(&self, guild_id: GuildId) -> Result<(), BackendError>;

    async fn search_direct(&self, uri: &str) -> Result<SearchResult, BackendError>;

    async fn search_by_query(&self, query: &str) -> Result<SearchResult, BackendError>;

    /// Starts `track`, replacing whatever is playing.
    async fn play(&self, guild_id: GuildId, track: &TrackRef) -> Result<(), BackendError>;

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError>;

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), BackendError>;

    async fn apply_filter(&self, guild_id: GuildId, filter: &FilterSpec) -> Result<(), BackendError>;

    /// Track loaded in the player, playing or paused.
    async fn now_playing(&self, guild_id: GuildId) -> Result<Option<TrackRef>, BackendError>;
}
