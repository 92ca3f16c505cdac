//! # Session Module
//!
//! Per-guild playback sessions and their lifecycle.
//!
//! - [`state`] - queue, loop mode and last started track
//! - [`idle`] - the cancellable idle-disconnect timer
//! - [`registry`] - the concurrent guild to session map
//!
//! A [`Session`] guards its [`SessionState`] with a short-lived mutex that is
//! never held across an `.await`; backend calls happen after the guard is
//! dropped.

pub mod idle;
pub mod registry;
pub mod state;

use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

pub use idle::IdleTimer;
pub use registry::{RegistryError, SessionRegistry};
pub use state::{Admission, LoopMode, NextStep, QueueFull, SessionState};

#[derive(Debug)]
pub struct Session {
    guild_id: GuildId,
    voice_channel: ChannelId,
    text_channel: ChannelId,
    state: Mutex<SessionState>,
    idle: IdleTimer,
    closing: AtomicBool,
}

impl Session {
    pub fn new(
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        max_queue_size: usize,
    ) -> Self {
        Self {
            guild_id,
            voice_channel,
            text_channel,
            state: Mutex::new(SessionState::new(max_queue_size)),
            idle: IdleTimer::new(),
            closing: AtomicBool::new(false),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn voice_channel(&self) -> ChannelId {
        self.voice_channel
    }

    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    /// Runs `f` with exclusive access to the session state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        f(&mut self.state.lock())
    }

    pub fn schedule_idle<F, Fut>(&self, delay: Duration, on_expire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.idle.schedule(delay, on_expire)
    }

    pub fn restart_idle<F, Fut>(&self, delay: Duration, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.idle.restart(delay, on_expire)
    }

    pub fn cancel_idle(&self) -> bool {
        self.idle.cancel()
    }

    #[cfg(test)]
    pub fn idle_pending(&self) -> bool {
        self.idle.is_pending()
    }

    /// Claims the right to tear this session down. Only the first caller wins.
    pub fn begin_close(&self) -> bool {
        self.closing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Gives the session back after a teardown that could not complete.
    pub fn abort_close(&self) {
        self.closing.store(false, Ordering::Release);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}
