//! # Coordinator Module
//!
//! Ties sessions, the audio backend and the front end together.
//!
//! - [`playback`] reacts to track started / track ended events
//! - [`dispatch`] feeds those events to one worker per guild, in order
//! - [`commands`] implements join/leave/play/list/skip/loop/volume/effect
//!
//! Teardown has a single entry point, [`Coordinator::teardown`], shared by
//! the `leave` command, the idle timer and external voice disconnects. The
//! session's close flag makes it fire exactly once.

pub mod commands;
pub mod dispatch;
pub mod playback;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

use crate::{
    audio::{
        backend::{AudioBackend, BackendError},
        track::TrackRef,
    },
    config::Config,
    session::{Session, SessionRegistry},
};

pub use commands::{Caller, CommandError, LoopRequest, QueueListing, Reply};
pub use dispatch::EventDispatcher;

/// Unsolicited messages for the guild's text channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NowPlaying(TrackRef),
    QueueCompleted,
    IdleDisconnectScheduled(Duration),
    IdleDisconnectCancelled,
    IdleDisconnected,
    Error(String),
}

/// Front end sink for [`Notice`]s. Delivery failures are the sink's problem.
///
/// `channel_id` is the text channel bound to the guild's session. It is
/// `None` only when the notice concerns a guild without a session.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, guild_id: GuildId, channel_id: Option<ChannelId>, notice: Notice);
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Grace period between the queue running dry and leaving voice.
    pub idle_timeout: Duration,
    pub max_queue_size: usize,
    /// Applied right after joining, when set.
    pub default_volume: Option<u16>,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            max_queue_size: config.max_queue_size,
            default_volume: Some(config.default_volume),
        }
    }
}

#[derive(Clone)]
pub struct Coordinator {
    registry: Arc<SessionRegistry>,
    backend: Arc<dyn AudioBackend>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<Settings>,
}

impl Coordinator {
    pub fn new(backend: Arc<dyn AudioBackend>, notifier: Arc<dyn Notifier>, settings: Settings) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(settings.max_queue_size)),
            backend,
            notifier,
            settings: Arc::new(settings),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Leaves voice and forgets the session. Returns `false` when another
    /// caller already owns the teardown.
    ///
    /// If the backend refuses to leave, the session is handed back so memory
    /// keeps matching the actual connection, and an idle session gets its
    /// disconnect timer back.
    pub async fn teardown(&self, session: &Arc<Session>) -> Result<bool, BackendError> {
        let guild_id = session.guild_id();
        if !session.begin_close() {
            debug!("Teardown of guild {} already in progress", guild_id);
            return Ok(false);
        }

        session.cancel_idle();

        if let Err(e) = self.backend.leave(guild_id).await {
            session.abort_close();
            error!("Could not leave voice in guild {}: {}", guild_id, e);
            if session.with_state(|state| state.is_idle()) {
                self.restart_idle_disconnect(session).await;
            }
            return Err(e);
        }

        self.registry.remove_session(session);
        info!(
            "🧹 Session closed for guild {} (left channel {})",
            guild_id,
            session.voice_channel()
        );
        Ok(true)
    }

    /// Bot was removed from voice by someone else.
    pub async fn handle_voice_disconnect(&self, guild_id: GuildId) {
        let Some(session) = self.registry.get(guild_id) else {
            return;
        };

        info!("🔌 Voice connection lost in guild {}, closing session", guild_id);
        if let Err(e) = self.teardown(&session).await {
            error!("Cleanup after voice disconnect failed in guild {}: {}", guild_id, e);
        }
    }

    /// Arms the idle disconnect for `session` unless one is already pending.
    pub(crate) async fn schedule_idle_disconnect(&self, session: &Arc<Session>) {
        let delay = self.settings.idle_timeout;
        if session.schedule_idle(delay, self.idle_action(session)) {
            self.announce_idle_disconnect(session, delay).await;
        }
    }

    /// Starts a full grace period, replacing any pending idle disconnect.
    async fn restart_idle_disconnect(&self, session: &Arc<Session>) {
        let delay = self.settings.idle_timeout;
        session.restart_idle(delay, self.idle_action(session));
        self.announce_idle_disconnect(session, delay).await;
    }

    fn idle_action(&self, session: &Arc<Session>) -> impl FnOnce() -> BoxFuture<'static, ()> + Send + 'static {
        let coordinator = self.clone();
        let target = Arc::clone(session);
        move || coordinator.expire(target)
    }

    async fn announce_idle_disconnect(&self, session: &Session, delay: Duration) {
        info!(
            "⏳ Auto-disconnect in {} for guild {}",
            humantime::format_duration(delay),
            session.guild_id()
        );
        self.notify(session, Notice::IdleDisconnectScheduled(delay)).await;
    }

    /// Posts `notice` to the text channel bound to `session`.
    pub(crate) async fn notify(&self, session: &Session, notice: Notice) {
        self.notifier
            .notify(session.guild_id(), Some(session.text_channel()), notice)
            .await;
    }

    // Boxed: a failed teardown re-arms the timer that calls back in here.
    fn expire(&self, session: Arc<Session>) -> BoxFuture<'static, ()> {
        let coordinator = self.clone();
        async move {
            match coordinator.teardown(&session).await {
                Ok(true) => coordinator.notify(&session, Notice::IdleDisconnected).await,
                Ok(false) => {}
                Err(e) => {
                    coordinator
                        .notify(&session, Notice::Error(format!("Auto-disconnect failed: {}", e)))
                        .await
                }
            }
        }
        .boxed()
    }
}
