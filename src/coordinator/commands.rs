//! User-facing operations. Each one validates, talks to the backend and
//! returns a [`Reply`] for the front end to render.

use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{info, warn};

use super::{Coordinator, Notice};
use crate::{
    audio::{
        backend::BackendError,
        effects::{Effect, UnknownEffect},
        track::{is_direct_uri, TrackRef},
    },
    session::{Admission, LoopMode, QueueFull, RegistryError, Session},
};

/// Who issued a command, and from where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub guild_id: GuildId,
    /// Voice channel the user currently sits in.
    pub voice_channel: Option<ChannelId>,
    /// Channel the command was typed in; notices go there.
    pub text_channel: ChannelId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueListing {
    pub now_playing: TrackRef,
    pub upcoming: Vec<TrackRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Joined { voice_channel: ChannelId },
    Left,
    NowPlaying(TrackRef),
    /// `position` counts the playing track as `#1`.
    Queued { track: TrackRef, position: usize },
    Queue(QueueListing),
    Skipped {
        skipped: Option<TrackRef>,
        next: Option<TrackRef>,
    },
    /// `times` is `None` for an endless loop.
    Looping { track: TrackRef, times: Option<u32> },
    Unlooped(TrackRef),
    VolumeSet(u16),
    EffectApplied(Effect),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopRequest {
    /// Flip between looping forever and not looping.
    Toggle,
    /// Replay the current track this many more times. `0` turns looping off.
    Times(u32),
}

impl LoopRequest {
    /// Front end form: missing or `-1` toggles, `N >= 0` counts.
    pub fn from_arg(arg: Option<i64>) -> Result<Self, CommandError> {
        match arg {
            None | Some(-1) => Ok(LoopRequest::Toggle),
            Some(n) => u32::try_from(n)
                .map(LoopRequest::Times)
                .map_err(|_| CommandError::InvalidLoopCount(n)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("You must be connected to a voice channel.")]
    NotInVoice,
    #[error("Already connected to a voice channel.")]
    AlreadyConnected,
    #[error("Still leaving the previous voice channel, try again in a moment.")]
    StillLeaving,
    #[error("I'm not connected to a voice channel.")]
    NotConnected,
    #[error("No music is being played right now.")]
    NothingPlaying,
    #[error("Nothing to skip.")]
    NothingToSkip,
    #[error("No search terms provided.")]
    EmptyQuery,
    #[error("Couldn't retrieve the track.")]
    NoMatches,
    #[error("Volume must be between 1 and 150.")]
    VolumeOutOfRange(i64),
    #[error("Loop count must be 0 or more, or -1 to toggle (got {0}).")]
    InvalidLoopCount(i64),
    #[error(transparent)]
    UnknownEffect(#[from] UnknownEffect),
    #[error(transparent)]
    QueueFull(#[from] QueueFull),
    #[error("Audio backend error: {0}")]
    Backend(#[from] BackendError),
}

impl CommandError {
    /// Failures of the system rather than of the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, CommandError::Backend(_))
    }
}

impl From<RegistryError> for CommandError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyExists => CommandError::AlreadyConnected,
            RegistryError::Closing => CommandError::StillLeaving,
        }
    }
}

pub const MIN_VOLUME: i64 = 1;
pub const MAX_VOLUME: i64 = 150;

impl Coordinator {
    pub async fn join(&self, caller: Caller) -> Result<Reply, CommandError> {
        if self.registry.get(caller.guild_id).is_some() {
            return Err(CommandError::AlreadyConnected);
        }
        let voice_channel = caller.voice_channel.ok_or(CommandError::NotInVoice)?;

        let reservation = self.registry.reserve(caller.guild_id)?;
        self.backend
            .join(caller.guild_id, voice_channel, caller.text_channel)
            .await?;
        reservation.commit(voice_channel, caller.text_channel);

        if let Some(volume) = self.settings.default_volume {
            if let Err(e) = self.backend.set_volume(caller.guild_id, volume).await {
                warn!("Default volume not applied in guild {}: {}", caller.guild_id, e);
            }
        }

        info!("🔊 Joined voice channel {} in guild {}", voice_channel, caller.guild_id);
        Ok(Reply::Joined { voice_channel })
    }

    pub async fn leave(&self, guild_id: GuildId) -> Result<Reply, CommandError> {
        let session = self.session(guild_id)?;

        if self.teardown(&session).await? {
            Ok(Reply::Left)
        } else {
            Err(CommandError::NotConnected)
        }
    }

    pub async fn play(&self, caller: Caller, query: &str) -> Result<Reply, CommandError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CommandError::EmptyQuery);
        }
        caller.voice_channel.ok_or(CommandError::NotInVoice)?;
        let session = self.session(caller.guild_id)?;

        let result = if is_direct_uri(query) {
            self.backend.search_direct(query).await?
        } else {
            self.backend.search_by_query(query).await?
        };
        let track = result.into_first().ok_or(CommandError::NoMatches)?;

        if let Admission::Queued(position) = session.with_state(|state| state.admit(track.clone()))? {
            return Ok(Reply::Queued { track, position });
        }

        let idle_cancelled = session.cancel_idle();
        if session.is_closing() {
            session.with_state(|state| state.halt());
            return Err(CommandError::NotConnected);
        }

        if let Err(e) = self.backend.play(caller.guild_id, &track).await {
            let idle = session.with_state(|state| {
                state.halt();
                state.is_idle()
            });
            if idle_cancelled && idle {
                self.schedule_idle_disconnect(&session).await;
            }
            return Err(e.into());
        }

        if idle_cancelled {
            self.notify(&session, Notice::IdleDisconnectCancelled).await;
        }
        Ok(Reply::NowPlaying(track))
    }

    pub async fn list(&self, guild_id: GuildId) -> Result<Reply, CommandError> {
        let session = self.session(guild_id)?;
        let now_playing = self
            .backend
            .now_playing(guild_id)
            .await?
            .ok_or(CommandError::NothingPlaying)?;

        Ok(Reply::Queue(QueueListing {
            now_playing,
            upcoming: session.with_state(|state| state.queued()),
        }))
    }

    /// Jumps to the next queued track, or stops when the queue is empty.
    /// Any loop on the skipped track is dropped.
    pub async fn skip(&self, caller: Caller) -> Result<Reply, CommandError> {
        caller.voice_channel.ok_or(CommandError::NotInVoice)?;
        let session = self.session(caller.guild_id)?;
        let current = self.backend.now_playing(caller.guild_id).await?;

        let Some(next) = session.with_state(|state| state.skip_to_next()) else {
            self.backend.stop(caller.guild_id).await?;
            self.schedule_idle_disconnect(&session).await;
            return match current {
                Some(skipped) => Ok(Reply::Skipped {
                    skipped: Some(skipped),
                    next: None,
                }),
                None => Err(CommandError::NothingToSkip),
            };
        };

        if let Err(e) = self.backend.play(caller.guild_id, &next).await {
            session.with_state(|state| {
                state.requeue_front(next);
                if current.is_none() {
                    state.halt();
                }
            });
            return Err(e.into());
        }

        Ok(Reply::Skipped {
            skipped: current,
            next: Some(next),
        })
    }

    /// Sets or toggles the loop on the track that is audible right now.
    pub async fn loop_track(&self, caller: Caller, request: LoopRequest) -> Result<Reply, CommandError> {
        caller.voice_channel.ok_or(CommandError::NotInVoice)?;
        let session = self.session(caller.guild_id)?;
        let current = self
            .backend
            .now_playing(caller.guild_id)
            .await?
            .ok_or(CommandError::NothingPlaying)?;

        let reply = session.with_state(|state| {
            state.start(current.clone());
            match request {
                LoopRequest::Times(0) => {
                    state.set_loop(LoopMode::Off);
                    Reply::Unlooped(current)
                }
                LoopRequest::Times(times) => {
                    state.set_loop(LoopMode::times(times));
                    Reply::Looping {
                        track: current,
                        times: Some(times),
                    }
                }
                LoopRequest::Toggle if state.toggle_loop() => Reply::Looping {
                    track: current,
                    times: None,
                },
                LoopRequest::Toggle => Reply::Unlooped(current),
            }
        });

        Ok(reply)
    }

    pub async fn volume(&self, guild_id: GuildId, volume: i64) -> Result<Reply, CommandError> {
        let volume = u16::try_from(volume)
            .ok()
            .filter(|v| (MIN_VOLUME..=MAX_VOLUME).contains(&i64::from(*v)))
            .ok_or(CommandError::VolumeOutOfRange(volume))?;
        self.session(guild_id)?;

        self.backend.set_volume(guild_id, volume).await?;
        Ok(Reply::VolumeSet(volume))
    }

    pub async fn effect(&self, caller: Caller, name: &str) -> Result<Reply, CommandError> {
        caller.voice_channel.ok_or(CommandError::NotInVoice)?;
        self.session(caller.guild_id)?;
        self.backend
            .now_playing(caller.guild_id)
            .await?
            .ok_or(CommandError::NothingPlaying)?;

        let effect: Effect = name.parse()?;
        self.backend
            .apply_filter(caller.guild_id, &effect.filters())
            .await?;

        info!("🎛️ Applied {} effect in guild {}", effect, caller.guild_id);
        Ok(Reply::EffectApplied(effect))
    }

    fn session(&self, guild_id: GuildId) -> Result<Arc<Session>, CommandError> {
        self.registry.get(guild_id).ok_or(CommandError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::backend::MockAudioBackend,
        coordinator::{
            testing::{harness, track_named, Call, RecordingNotifier},
            Settings,
        },
    };
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn caller(guild: u64) -> Caller {
        Caller {
            guild_id: GuildId::new(guild),
            voice_channel: Some(ChannelId::new(guild * 10)),
            text_channel: ChannelId::new(guild * 10 + 1),
        }
    }

    fn with_mock(backend: MockAudioBackend) -> Coordinator {
        Coordinator::new(
            Arc::new(backend),
            Arc::new(RecordingNotifier::default()),
            Settings {
                idle_timeout: Duration::from_secs(600),
                max_queue_size: 10,
                default_volume: None,
            },
        )
    }

    #[test]
    fn test_loop_argument_parsing() {
        assert_eq!(LoopRequest::from_arg(None).unwrap(), LoopRequest::Toggle);
        assert_eq!(LoopRequest::from_arg(Some(-1)).unwrap(), LoopRequest::Toggle);
        assert_eq!(LoopRequest::from_arg(Some(0)).unwrap(), LoopRequest::Times(0));
        assert_eq!(LoopRequest::from_arg(Some(3)).unwrap(), LoopRequest::Times(3));
        assert!(matches!(
            LoopRequest::from_arg(Some(-2)),
            Err(CommandError::InvalidLoopCount(-2))
        ));
    }

    #[tokio::test]
    async fn test_volume_bounds() {
        let mut backend = MockAudioBackend::new();
        backend.expect_join().returning(|_, _, _| Ok(()));
        backend
            .expect_set_volume()
            .withf(|_, volume| *volume == 1 || *volume == 150)
            .times(2)
            .returning(|_, _| Ok(()));
        let coordinator = with_mock(backend);
        let guild = caller(1);
        coordinator.join(guild).await.unwrap();

        for bad in [0, 151, -5, 70_000] {
            assert!(matches!(
                coordinator.volume(guild.guild_id, bad).await,
                Err(CommandError::VolumeOutOfRange(v)) if v == bad
            ));
        }
        assert_eq!(coordinator.volume(guild.guild_id, 1).await.unwrap(), Reply::VolumeSet(1));
        assert_eq!(
            coordinator.volume(guild.guild_id, 150).await.unwrap(),
            Reply::VolumeSet(150)
        );
    }

    #[tokio::test]
    async fn test_volume_range_checked_before_session() {
        let coordinator = with_mock(MockAudioBackend::new());
        assert!(matches!(
            coordinator.volume(GuildId::new(5), 200).await,
            Err(CommandError::VolumeOutOfRange(200))
        ));
        assert!(matches!(
            coordinator.volume(GuildId::new(5), 50).await,
            Err(CommandError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_failed_join_leaves_no_session() {
        let mut backend = MockAudioBackend::new();
        let mut attempts = 0;
        backend.expect_join().times(2).returning(move |_, _, _| {
            attempts += 1;
            if attempts == 1 {
                Err(BackendError::Voice("gateway timed out".to_string()))
            } else {
                Ok(())
            }
        });
        let coordinator = with_mock(backend);
        let guild = caller(2);

        assert!(matches!(
            coordinator.join(guild).await,
            Err(CommandError::Backend(BackendError::Voice(_)))
        ));
        assert!(coordinator.registry().get(guild.guild_id).is_none());
        assert!(coordinator.registry().is_empty());

        assert_eq!(
            coordinator.join(guild).await.unwrap(),
            Reply::Joined {
                voice_channel: ChannelId::new(20)
            }
        );
        assert!(coordinator.registry().get(guild.guild_id).is_some());
    }

    #[tokio::test]
    async fn test_join_rules() {
        let h = harness().await;

        assert!(matches!(
            h.coordinator.join(h.caller()).await,
            Err(CommandError::AlreadyConnected)
        ));

        let mut lonely = caller(7);
        lonely.voice_channel = None;
        assert!(matches!(
            h.coordinator.join(lonely).await,
            Err(CommandError::NotInVoice)
        ));
        assert!(h.coordinator.registry().get(lonely.guild_id).is_none());
    }

    #[tokio::test]
    async fn test_join_applies_default_volume() {
        let h = harness().await;
        assert_eq!(
            h.backend.count(|call| matches!(call, Call::SetVolume(100))),
            1
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_leave_tears_down_once() {
        let h = harness().await;

        let (first, second) = tokio::join!(
            h.coordinator.leave(h.guild),
            h.coordinator.leave(h.guild)
        );

        let outcomes = [first, second];
        assert_eq!(outcomes.iter().filter(|r| matches!(r, Ok(Reply::Left))).count(), 1);
        assert_eq!(
            outcomes
                .iter()
                .filter(|r| matches!(r, Err(CommandError::NotConnected)))
                .count(),
            1
        );
        assert_eq!(h.backend.count(|call| matches!(call, Call::Leave)), 1);
        assert!(h.coordinator.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_racing_idle_expiry_tears_down_once() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.coordinator
            .on_track_ended(
                h.guild,
                &track_named("a"),
                crate::audio::backend::TrackEndReason::Finished,
            )
            .await;

        // The fake backend holds `leave` open long enough for both paths to overlap.
        tokio::time::sleep(h.idle_timeout()).await;
        let left = h.coordinator.leave(h.guild).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let idle_disconnected = h.notifier.notices().contains(&Notice::IdleDisconnected);
        match left {
            Ok(Reply::Left) => assert!(!idle_disconnected),
            Err(CommandError::NotConnected) => assert!(idle_disconnected),
            other => panic!("unexpected leave outcome: {:?}", other),
        }
        assert_eq!(h.backend.count(|call| matches!(call, Call::Leave)), 1);
        assert!(h.coordinator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_failed_leave_keeps_session() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.backend.fail_leave(true);

        assert!(matches!(
            h.coordinator.leave(h.guild).await,
            Err(CommandError::Backend(_))
        ));
        assert!(h.coordinator.registry().get(h.guild).is_some());
        assert!(!h.session().idle_pending());

        h.backend.fail_leave(false);
        assert_eq!(h.coordinator.leave(h.guild).await.unwrap(), Reply::Left);
        assert!(matches!(
            h.coordinator.leave(h.guild).await,
            Err(CommandError::NotConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_leave_rearms_idle_disconnect() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.coordinator
            .on_track_ended(
                h.guild,
                &track_named("a"),
                crate::audio::backend::TrackEndReason::Finished,
            )
            .await;
        assert!(h.session().idle_pending());

        h.backend.fail_leave(true);
        assert!(matches!(
            h.coordinator.leave(h.guild).await,
            Err(CommandError::Backend(_))
        ));
        assert!(h.session().idle_pending());

        h.backend.fail_leave(false);
        tokio::time::sleep(h.idle_timeout() * 3).await;

        assert!(h.coordinator.registry().get(h.guild).is_none());
        assert_eq!(h.backend.count(|call| matches!(call, Call::Leave)), 2);
        assert_eq!(h.notifier.notices().last(), Some(&Notice::IdleDisconnected));
    }

    #[tokio::test]
    async fn test_play_starts_then_queues() {
        let h = harness().await;

        assert_eq!(
            h.coordinator.play(h.caller(), "a").await.unwrap(),
            Reply::NowPlaying(track_named("a"))
        );
        assert_eq!(
            h.coordinator.play(h.caller(), "b").await.unwrap(),
            Reply::Queued {
                track: track_named("b"),
                position: 2
            }
        );
        assert_eq!(
            h.coordinator.play(h.caller(), "c").await.unwrap(),
            Reply::Queued {
                track: track_named("c"),
                position: 3
            }
        );
        assert_eq!(h.backend.played(), vec!["a"]);
    }

    #[tokio::test]
    async fn test_concurrent_plays_start_one_track_and_queue_the_other() {
        let h = harness().await;

        let (first, second) = tokio::join!(
            h.coordinator.play(h.caller(), "a"),
            h.coordinator.play(h.caller(), "b")
        );

        assert_eq!(first.unwrap(), Reply::NowPlaying(track_named("a")));
        assert_eq!(
            second.unwrap(),
            Reply::Queued {
                track: track_named("b"),
                position: 2
            }
        );
        assert_eq!(h.backend.played(), vec!["a"]);
        assert_eq!(h.session().with_state(|s| s.queued()), vec![track_named("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_during_leave_reports_not_connected() {
        let h = harness().await;

        let (played, left) = tokio::join!(
            h.coordinator.play(h.caller(), "a"),
            h.coordinator.leave(h.guild)
        );

        assert!(matches!(played, Err(CommandError::NotConnected)));
        assert_eq!(left.unwrap(), Reply::Left);
        assert!(h.backend.played().is_empty());
        assert!(h.coordinator.registry().is_empty());
    }

    #[tokio::test]
    async fn test_failed_play_releases_the_player() {
        let h = harness().await;
        h.backend.fail_play(true);

        assert!(matches!(
            h.coordinator.play(h.caller(), "a").await,
            Err(CommandError::Backend(_))
        ));

        h.backend.fail_play(false);
        assert_eq!(
            h.coordinator.play(h.caller(), "b").await.unwrap(),
            Reply::NowPlaying(track_named("b"))
        );
        assert_eq!(h.backend.played(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_play_routes_urls_to_direct_search() {
        let h = harness().await;
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

        let Reply::NowPlaying(track) = h.coordinator.play(h.caller(), url).await.unwrap() else {
            panic!("expected the track to start");
        };
        assert!(track.is_direct_uri);
        assert_eq!(h.backend.count(|call| matches!(call, Call::SearchDirect(_))), 1);
        assert_eq!(h.backend.count(|call| matches!(call, Call::SearchByQuery(_))), 0);
    }

    #[tokio::test]
    async fn test_play_validation() {
        let h = harness().await;

        assert!(matches!(
            h.coordinator.play(h.caller(), "   ").await,
            Err(CommandError::EmptyQuery)
        ));
        assert!(matches!(
            h.coordinator.play(h.caller(), "missing").await,
            Err(CommandError::NoMatches)
        ));
        assert!(matches!(
            h.coordinator.play(caller(42), "a").await,
            Err(CommandError::NotConnected)
        ));

        let mut outside = h.caller();
        outside.voice_channel = None;
        assert!(matches!(
            h.coordinator.play(outside, "a").await,
            Err(CommandError::NotInVoice)
        ));
        assert!(h.backend.played().is_empty());
    }

    #[tokio::test]
    async fn test_play_reports_full_queue() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "playing").await.unwrap();
        for n in 0..h.max_queue_size() {
            h.coordinator
                .play(h.caller(), &format!("t{}", n))
                .await
                .unwrap();
        }

        assert!(matches!(
            h.coordinator.play(h.caller(), "overflow").await,
            Err(CommandError::QueueFull(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_cancels_pending_idle() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.backend.set_playing(None);
        h.coordinator
            .on_track_ended(
                h.guild,
                &track_named("a"),
                crate::audio::backend::TrackEndReason::Finished,
            )
            .await;
        assert!(h.session().idle_pending());

        h.coordinator.play(h.caller(), "b").await.unwrap();
        assert!(!h.session().idle_pending());
        assert_eq!(h.notifier.notices().last(), Some(&Notice::IdleDisconnectCancelled));

        tokio::time::sleep(h.idle_timeout() * 2).await;
        assert!(h.coordinator.registry().get(h.guild).is_some());
    }

    #[tokio::test]
    async fn test_list_shows_current_and_upcoming() {
        let h = harness().await;
        assert!(matches!(
            h.coordinator.list(h.guild).await,
            Err(CommandError::NothingPlaying)
        ));

        for name in ["a", "b", "c"] {
            h.coordinator.play(h.caller(), name).await.unwrap();
        }

        assert_eq!(
            h.coordinator.list(h.guild).await.unwrap(),
            Reply::Queue(QueueListing {
                now_playing: track_named("a"),
                upcoming: vec![track_named("b"), track_named("c")],
            })
        );
    }

    #[tokio::test]
    async fn test_skip_advances_and_clears_loop() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.coordinator.play(h.caller(), "b").await.unwrap();
        h.coordinator
            .loop_track(h.caller(), LoopRequest::Toggle)
            .await
            .unwrap();

        assert_eq!(
            h.coordinator.skip(h.caller()).await.unwrap(),
            Reply::Skipped {
                skipped: Some(track_named("a")),
                next: Some(track_named("b")),
            }
        );
        assert_eq!(h.session().with_state(|s| s.loop_mode()), LoopMode::Off);
        assert_eq!(h.backend.played(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_on_empty_queue_stops_and_schedules_idle() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();

        assert_eq!(
            h.coordinator.skip(h.caller()).await.unwrap(),
            Reply::Skipped {
                skipped: Some(track_named("a")),
                next: None,
            }
        );
        assert_eq!(h.backend.count(|call| matches!(call, Call::Stop)), 1);
        assert!(h.session().idle_pending());

        assert!(matches!(
            h.coordinator.skip(h.caller()).await,
            Err(CommandError::NothingToSkip)
        ));
    }

    #[tokio::test]
    async fn test_failed_skip_keeps_next_track_queued() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.coordinator.play(h.caller(), "b").await.unwrap();
        h.backend.fail_play(true);

        assert!(matches!(
            h.coordinator.skip(h.caller()).await,
            Err(CommandError::Backend(_))
        ));
        assert_eq!(h.session().with_state(|s| s.queued()), vec![track_named("b")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_recovers_a_stalled_queue() {
        let h = harness().await;
        h.coordinator.play(h.caller(), "a").await.unwrap();
        h.coordinator.play(h.caller(), "b").await.unwrap();
        h.coordinator.play(h.caller(), "c").await.unwrap();

        h.backend.fail_play(true);
        h.coordinator
            .on_track_ended(
                h.guild,
                &track_named("a"),
                crate::audio::backend::TrackEndReason::Finished,
            )
            .await;
        h.backend.set_playing(None);
        h.backend.fail_play(false);

        assert_eq!(
            h.coordinator.skip(h.caller()).await.unwrap(),
            Reply::Skipped {
                skipped: None,
                next: Some(track_named("c")),
            }
        );
        assert_eq!(
            h.coordinator.play(h.caller(), "d").await.unwrap(),
            Reply::Queued {
                track: track_named("d"),
                position: 2
            }
        );
    }

    #[tokio::test]
    async fn test_loop_set_and_toggle() {
        let h = harness().await;
        assert!(matches!(
            h.coordinator.loop_track(h.caller(), LoopRequest::Toggle).await,
            Err(CommandError::NothingPlaying)
        ));

        h.coordinator.play(h.caller(), "a").await.unwrap();

        assert_eq!(
            h.coordinator
                .loop_track(h.caller(), LoopRequest::Times(2))
                .await
                .unwrap(),
            Reply::Looping {
                track: track_named("a"),
                times: Some(2)
            }
        );
        assert_eq!(h.session().with_state(|s| s.loop_mode()), LoopMode::Remaining(2));

        assert_eq!(
            h.coordinator
                .loop_track(h.caller(), LoopRequest::Toggle)
                .await
                .unwrap(),
            Reply::Unlooped(track_named("a"))
        );
        assert_eq!(
            h.coordinator
                .loop_track(h.caller(), LoopRequest::Toggle)
                .await
                .unwrap(),
            Reply::Looping {
                track: track_named("a"),
                times: None
            }
        );
        assert_eq!(
            h.coordinator
                .loop_track(h.caller(), LoopRequest::Times(0))
                .await
                .unwrap(),
            Reply::Unlooped(track_named("a"))
        );
        assert_eq!(h.session().with_state(|s| s.loop_mode()), LoopMode::Off);
    }

    #[tokio::test]
    async fn test_effect_requires_playback_and_known_name() {
        let h = harness().await;
        assert!(matches!(
            h.coordinator.effect(h.caller(), "karaoke").await,
            Err(CommandError::NothingPlaying)
        ));

        h.coordinator.play(h.caller(), "a").await.unwrap();
        assert!(matches!(
            h.coordinator.effect(h.caller(), "vaporwave").await,
            Err(CommandError::UnknownEffect(_))
        ));
        assert_eq!(
            h.coordinator.effect(h.caller(), "Karaoke").await.unwrap(),
            Reply::EffectApplied(Effect::Karaoke)
        );
        assert_eq!(h.backend.count(|call| matches!(call, Call::ApplyFilter)), 1);
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CommandError::NotInVoice.to_string(),
            "You must be connected to a voice channel."
        );
        assert_eq!(
            CommandError::VolumeOutOfRange(0).to_string(),
            "Volume must be between 1 and 150."
        );
        assert_eq!(
            CommandError::from(RegistryError::AlreadyExists).to_string(),
            "Already connected to a voice channel."
        );
        assert!(CommandError::Backend(BackendError::Load("no matches".to_string())).is_internal());
        assert!(!CommandError::NoMatches.is_internal());
    }
}
