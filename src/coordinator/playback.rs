use serenity::model::id::GuildId;
use tracing::{debug, error, info, warn};

use super::{Coordinator, Notice};
use crate::{
    audio::{
        backend::{PlaybackEvent, TrackEndReason},
        track::TrackRef,
    },
    session::NextStep,
};

impl Coordinator {
    pub async fn handle_event(&self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::TrackStarted { guild_id, track } => {
                self.on_track_started(guild_id, &track).await
            }
            PlaybackEvent::TrackEnded {
                guild_id,
                track,
                reason,
            } => self.on_track_ended(guild_id, &track, reason).await,
        }
    }

    /// Music is flowing again, so a pending idle disconnect must not fire.
    pub async fn on_track_started(&self, guild_id: GuildId, track: &TrackRef) {
        info!("▶️ Playing {} in guild {}", track.title, guild_id);

        let Some(session) = self.registry.get(guild_id) else {
            warn!("Track started in guild {} without a session", guild_id);
            return;
        };

        if session.cancel_idle() {
            self.notify(&session, Notice::IdleDisconnectCancelled).await;
        }
    }

    pub async fn on_track_ended(&self, guild_id: GuildId, track: &TrackRef, reason: TrackEndReason) {
        if !reason.advances_queue() {
            debug!("Track {} ended in guild {} ({:?}), ignoring", track.title, guild_id, reason);
            return;
        }

        let Some(session) = self.registry.get(guild_id) else {
            warn!("Track ended in guild {} without a session", guild_id);
            self.notifier
                .notify(
                    guild_id,
                    None,
                    Notice::Error("An error occurred while switching tracks.".to_string()),
                )
                .await;
            return;
        };

        let step = session.with_state(|state| state.next_step());
        let announce = matches!(step, NextStep::Advance(_));

        let (track, failure) = match step {
            NextStep::Replay(track) => (track, "Couldn't replay the track"),
            NextStep::Advance(track) => (track, "Couldn't play the next track"),
            NextStep::Exhausted => {
                info!("📭 Queue completed in guild {}", guild_id);
                self.notify(&session, Notice::QueueCompleted).await;
                self.schedule_idle_disconnect(&session).await;
                return;
            }
        };

        match self.backend.play(guild_id, &track).await {
            Ok(()) if announce => self.notify(&session, Notice::NowPlaying(track)).await,
            Ok(()) => {}
            Err(e) => {
                error!("{} in guild {}: {}", failure, guild_id, e);
                session.with_state(|state| state.halt());
                self.notify(&session, Notice::Error(format!("{}: {}", failure, e)))
                    .await;
                if session.with_state(|state| state.is_idle()) {
                    self.schedule_idle_disconnect(&session).await;
                }
            }
        }
    }
}
