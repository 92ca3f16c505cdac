//! In-memory backend and notifier used by the coordinator tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use super::{Caller, Coordinator, Notice, Notifier, Settings};
use crate::{
    audio::{
        backend::{AudioBackend, BackendError},
        effects::FilterSpec,
        track::{SearchResult, TrackRef},
    },
    session::Session,
};

/// How long the fake keeps a `leave` in flight.
const LEAVE_LATENCY: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Join(ChannelId),
    Leave,
    SearchDirect(String),
    SearchByQuery(String),
    Play(String),
    Stop,
    SetVolume(u16),
    ApplyFilter,
}

pub fn track_named(name: &str) -> TrackRef {
    TrackRef::new(name, format!("https://example.com/{}", name), name)
}

/// Behaves like a single-guild player: `play` makes a track current and
/// `stop` clears it. Queries named `missing` find nothing. Searches,
/// `play` and `now_playing` yield once so concurrent commands interleave.
#[derive(Debug, Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<Call>>,
    playing: Mutex<Option<TrackRef>>,
    fail_leave: AtomicBool,
    fail_play: AtomicBool,
}

impl FakeBackend {
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| pred(call)).count()
    }

    /// Titles passed to `play`, in order.
    pub fn played(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::Play(title) => Some(title.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn plays_of(&self, title: &str) -> usize {
        self.played().iter().filter(|t| *t == title).count()
    }

    pub fn set_playing(&self, track: Option<TrackRef>) {
        *self.playing.lock() = track;
    }

    pub fn fail_leave(&self, fail: bool) {
        self.fail_leave.store(fail, Ordering::SeqCst);
    }

    pub fn fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn join(
        &self,
        _guild_id: GuildId,
        voice_channel: ChannelId,
        _text_channel: ChannelId,
    ) -> Result<(), BackendError> {
        self.record(Call::Join(voice_channel));
        Ok(())
    }

    async fn leave(&self, _guild_id: GuildId) -> Result<(), BackendError> {
        self.record(Call::Leave);
        tokio::time::sleep(LEAVE_LATENCY).await;
        if self.fail_leave.load(Ordering::SeqCst) {
            return Err(BackendError::Voice("gateway did not answer".to_string()));
        }
        self.set_playing(None);
        Ok(())
    }

    async fn search_direct(&self, uri: &str) -> Result<SearchResult, BackendError> {
        self.record(Call::SearchDirect(uri.to_string()));
        tokio::task::yield_now().await;
        Ok(SearchResult::found(vec![TrackRef::new(uri, uri, uri).direct()]))
    }

    async fn search_by_query(&self, query: &str) -> Result<SearchResult, BackendError> {
        self.record(Call::SearchByQuery(query.to_string()));
        tokio::task::yield_now().await;
        if query == "missing" {
            return Ok(SearchResult::no_matches());
        }
        Ok(SearchResult::found(vec![track_named(query)]))
    }

    async fn play(&self, _guild_id: GuildId, track: &TrackRef) -> Result<(), BackendError> {
        tokio::task::yield_now().await;
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                status: 500,
                message: "player unavailable".to_string(),
            });
        }
        self.record(Call::Play(track.title.clone()));
        self.set_playing(Some(track.clone()));
        Ok(())
    }

    async fn stop(&self, _guild_id: GuildId) -> Result<(), BackendError> {
        self.record(Call::Stop);
        self.set_playing(None);
        Ok(())
    }

    async fn set_volume(&self, _guild_id: GuildId, volume: u16) -> Result<(), BackendError> {
        self.record(Call::SetVolume(volume));
        Ok(())
    }

    async fn apply_filter(&self, _guild_id: GuildId, _filter: &FilterSpec) -> Result<(), BackendError> {
        self.record(Call::ApplyFilter);
        Ok(())
    }

    async fn now_playing(&self, _guild_id: GuildId) -> Result<Option<TrackRef>, BackendError> {
        tokio::task::yield_now().await;
        Ok(self.playing.lock().clone())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(GuildId, Option<ChannelId>, Notice)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.sent.lock().iter().map(|(_, _, n)| n.clone()).collect()
    }

    pub fn notices_for(&self, guild_id: GuildId) -> Vec<Notice> {
        self.sent
            .lock()
            .iter()
            .filter(|(g, _, _)| *g == guild_id)
            .map(|(_, _, n)| n.clone())
            .collect()
    }

    /// Distinct channels notices were addressed to, in first-use order.
    pub fn channels(&self) -> Vec<Option<ChannelId>> {
        let mut channels = Vec::new();
        for (_, channel, _) in self.sent.lock().iter() {
            if !channels.contains(channel) {
                channels.push(*channel);
            }
        }
        channels
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, guild_id: GuildId, channel_id: Option<ChannelId>, notice: Notice) {
        self.sent.lock().push((guild_id, channel_id, notice));
    }
}

/// A coordinator with one joined guild.
pub struct Harness {
    pub coordinator: Coordinator,
    pub backend: Arc<FakeBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub guild: GuildId,
    settings: Settings,
}

impl Harness {
    pub fn caller(&self) -> Caller {
        Caller {
            guild_id: self.guild,
            voice_channel: Some(ChannelId::new(10)),
            text_channel: ChannelId::new(11),
        }
    }

    pub fn session(&self) -> Arc<Session> {
        self.coordinator
            .registry()
            .get(self.guild)
            .expect("harness guild has a session")
    }

    pub fn idle_timeout(&self) -> Duration {
        self.settings.idle_timeout
    }

    pub fn max_queue_size(&self) -> usize {
        self.settings.max_queue_size
    }
}

pub async fn harness() -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let settings = Settings {
        idle_timeout: Duration::from_secs(600),
        max_queue_size: 5,
        default_volume: Some(100),
    };

    let coordinator = Coordinator::new(backend.clone(), notifier.clone(), settings.clone());
    let harness = Harness {
        coordinator,
        backend,
        notifier,
        guild: GuildId::new(1),
        settings,
    };

    harness
        .coordinator
        .join(harness.caller())
        .await
        .expect("harness join succeeds");
    harness
}
