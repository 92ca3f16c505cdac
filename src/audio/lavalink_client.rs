use anyhow::Context as _;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::AUTHORIZATION, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::{error::JoinError, Songbird};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{client::IntoClientRequest, http::HeaderValue, protocol::Message};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::{AudioBackend, BackendError, PlaybackEvent, TrackEndReason},
        effects::FilterSpec,
        track::{SearchResult, TrackRef},
    },
    config::Config,
};

const CLIENT_NAME: &str = concat!("music-coordinator/", env!("CARGO_PKG_VERSION"));

/// Lavalink v4 node used as the audio backend.
///
/// Voice connections go through songbird's gateway-only join; the resulting
/// credentials are handed to the node, which streams the audio itself.
pub struct LavalinkManager {
    http: reqwest::Client,
    rest_base: String,
    password: String,
    session_id: String,
    songbird: Arc<Songbird>,
}

impl LavalinkManager {
    /// Opens the event socket, waits for the node's `ready` op and starts
    /// forwarding track events to the returned receiver.
    pub async fn connect(
        config: &Config,
        user_id: UserId,
        songbird: Arc<Songbird>,
    ) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<PlaybackEvent>)> {
        let (http_scheme, ws_scheme) = if config.lavalink_ssl {
            ("https", "wss")
        } else {
            ("http", "ws")
        };
        let authority = format!("{}:{}", config.lavalink_host, config.lavalink_port);

        info!("🎼 Connecting to Lavalink at {}", authority);

        let mut request = format!("{}://{}/v4/websocket", ws_scheme, authority).into_client_request()?;
        let headers = request.headers_mut();
        headers.insert("Authorization", HeaderValue::from_str(&config.lavalink_password)?);
        headers.insert("User-Id", HeaderValue::from_str(&user_id.to_string())?);
        headers.insert("Client-Name", HeaderValue::from_static(CLIENT_NAME));

        let (mut socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .context("Could not open the Lavalink websocket")?;

        let session_id = loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(IncomingOp::Ready { session_id, resumed }) =
                        serde_json::from_str::<IncomingOp>(text.as_str())
                    {
                        info!("✅ Lavalink ready (session {}, resumed: {})", session_id, resumed);
                        break session_id;
                    }
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e).context("Lavalink websocket failed before ready"),
                None => anyhow::bail!("Lavalink closed the websocket before sending ready"),
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(message) = socket.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(event) = parse_event(text.as_str()) {
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        warn!("🔌 Lavalink closed the websocket: {:?}", frame);
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("Lavalink websocket error: {:?}", e);
                        break;
                    }
                }
            }
            error!("❌ Lavalink event stream ended, playback events will no longer arrive");
        });

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Could not build the Lavalink HTTP client")?;

        let manager = Self {
            http,
            rest_base: format!("{}://{}", http_scheme, authority),
            password: config.lavalink_password.clone(),
            session_id,
            songbird,
        };

        Ok((manager, events_rx))
    }

    fn player_url(&self, guild_id: GuildId) -> String {
        format!(
            "{}/v4/sessions/{}/players/{}",
            self.rest_base, self.session_id, guild_id
        )
    }

    async fn update_player(&self, guild_id: GuildId, update: &PlayerUpdate<'_>) -> Result<(), BackendError> {
        let response = self
            .http
            .patch(self.player_url(guild_id))
            .header(AUTHORIZATION, &self.password)
            .json(update)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }

    async fn load(&self, identifier: &str, direct: bool) -> Result<SearchResult, BackendError> {
        let url = format!(
            "{}/v4/loadtracks?identifier={}",
            self.rest_base,
            urlencoding::encode(identifier)
        );

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, &self.password)
            .send()
            .await?;

        let result: LoadResult = check(response).await?.json().await?;
        let tracks = match result {
            LoadResult::Track(track) => vec![track],
            LoadResult::Playlist(playlist) => playlist.tracks,
            LoadResult::Search(tracks) => tracks,
            LoadResult::Empty(_) => {
                debug!("No results for: {}", identifier);
                Vec::new()
            }
            LoadResult::Error(exception) => {
                return Err(BackendError::Load(
                    exception
                        .message
                        .or(exception.cause)
                        .unwrap_or_else(|| "unknown error".to_string()),
                ));
            }
        };

        Ok(SearchResult::found(
            tracks.into_iter().map(|track| track.into_track(direct)).collect(),
        ))
    }
}

#[async_trait]
impl AudioBackend for LavalinkManager {
    async fn join(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        _text_channel: ChannelId,
    ) -> Result<(), BackendError> {
        let (info, _call) = self
            .songbird
            .join_gateway(guild_id, voice_channel)
            .await
            .map_err(|e| BackendError::Voice(e.to_string()))?;

        let update = PlayerUpdate {
            voice: Some(VoiceUpdate {
                token: info.token,
                endpoint: info.endpoint,
                session_id: info.session_id,
            }),
            ..Default::default()
        };

        if let Err(e) = self.update_player(guild_id, &update).await {
            // The node never got the voice credentials; drop the gateway side too.
            if let Err(remove_err) = self.songbird.remove(guild_id).await {
                warn!("Could not undo voice join in guild {}: {:?}", guild_id, remove_err);
            }
            return Err(e);
        }

        info!("🔊 Connected to voice channel {} in guild {}", voice_channel, guild_id);
        Ok(())
    }

    async fn leave(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let response = self
            .http
            .delete(self.player_url(guild_id))
            .header(AUTHORIZATION, &self.password)
            .send()
            .await?;

        if response.status() != StatusCode::NOT_FOUND {
            check(response).await?;
        }

        match self.songbird.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => {
                info!("👋 Left voice in guild {}", guild_id);
                Ok(())
            }
            Err(e) => Err(BackendError::Voice(e.to_string())),
        }
    }

    async fn search_direct(&self, uri: &str) -> Result<SearchResult, BackendError> {
        self.load(uri, true).await
    }

    async fn search_by_query(&self, query: &str) -> Result<SearchResult, BackendError> {
        self.load(&format!("ytsearch:{}", query), false).await
    }

    async fn play(&self, guild_id: GuildId, track: &TrackRef) -> Result<(), BackendError> {
        let update = PlayerUpdate {
            track: Some(TrackUpdate {
                encoded: Some(&track.encoded),
            }),
            ..Default::default()
        };
        self.update_player(guild_id, &update).await
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), BackendError> {
        let update = PlayerUpdate {
            track: Some(TrackUpdate { encoded: None }),
            ..Default::default()
        };
        self.update_player(guild_id, &update).await
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), BackendError> {
        let update = PlayerUpdate {
            volume: Some(volume),
            ..Default::default()
        };
        self.update_player(guild_id, &update).await
    }

    async fn apply_filter(&self, guild_id: GuildId, filter: &FilterSpec) -> Result<(), BackendError> {
        let update = PlayerUpdate {
            filters: Some(filter),
            ..Default::default()
        };
        self.update_player(guild_id, &update).await
    }

    async fn now_playing(&self, guild_id: GuildId) -> Result<Option<TrackRef>, BackendError> {
        let response = self
            .http
            .get(self.player_url(guild_id))
            .header(AUTHORIZATION, &self.password)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let player: LavaPlayer = check(response).await?.json().await?;
        Ok(player.track.map(|track| track.into_track(false)))
    }
}

async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Rejected {
        status: status.as_u16(),
        message,
    })
}

/// Decodes a websocket frame into a playback event, if it is one.
fn parse_event(text: &str) -> Option<PlaybackEvent> {
    let op = match serde_json::from_str::<IncomingOp>(text) {
        Ok(op) => op,
        Err(e) => {
            warn!("Unreadable Lavalink message: {}", e);
            return None;
        }
    };

    let event = match op {
        IncomingOp::Event(event) => event,
        IncomingOp::Ready { .. } | IncomingOp::Other => return None,
    };

    match event {
        RawEvent::TrackStartEvent { guild_id, track } => Some(PlaybackEvent::TrackStarted {
            guild_id: parse_guild(&guild_id)?,
            track: track.into_track(false),
        }),
        RawEvent::TrackEndEvent {
            guild_id,
            track,
            reason,
        } => Some(PlaybackEvent::TrackEnded {
            guild_id: parse_guild(&guild_id)?,
            track: track.into_track(false),
            reason,
        }),
        RawEvent::Other => None,
    }
}

fn parse_guild(raw: &str) -> Option<GuildId> {
    raw.parse::<u64>().ok().filter(|id| *id != 0).map(GuildId::new)
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
enum IncomingOp {
    Ready {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(default)]
        resumed: bool,
    },
    Event(RawEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum RawEvent {
    TrackStartEvent {
        #[serde(rename = "guildId")]
        guild_id: String,
        track: LavaTrack,
    },
    TrackEndEvent {
        #[serde(rename = "guildId")]
        guild_id: String,
        track: LavaTrack,
        reason: TrackEndReason,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "loadType", content = "data", rename_all = "lowercase")]
enum LoadResult {
    Track(LavaTrack),
    Playlist(LavaPlaylist),
    Search(Vec<LavaTrack>),
    Empty(serde_json::Value),
    Error(LavaException),
}

#[derive(Debug, Deserialize)]
struct LavaPlaylist {
    tracks: Vec<LavaTrack>,
}

#[derive(Debug, Deserialize)]
struct LavaException {
    message: Option<String>,
    cause: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LavaPlayer {
    track: Option<LavaTrack>,
}

#[derive(Debug, Deserialize)]
struct LavaTrack {
    encoded: String,
    info: LavaTrackInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LavaTrackInfo {
    identifier: String,
    title: String,
    author: String,
    length: u64,
    is_stream: bool,
    uri: Option<String>,
}

impl LavaTrack {
    fn into_track(self, direct: bool) -> TrackRef {
        let info = self.info;
        TrackRef {
            title: info.title,
            url: info.uri.unwrap_or(info.identifier),
            author: Some(info.author).filter(|author| !author.is_empty()),
            duration: (!info.is_stream).then(|| Duration::from_millis(info.length)),
            is_direct_uri: direct,
            encoded: self.encoded,
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerUpdate<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<TrackUpdate<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<&'a FilterSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<VoiceUpdate>,
}

/// `encoded: None` serializes as `null`, which stops the player.
#[derive(Debug, Serialize)]
struct TrackUpdate<'a> {
    encoded: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceUpdate {
    token: String,
    endpoint: String,
    session_id: String,
}
