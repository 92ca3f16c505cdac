//! Per-guild event serialization.
//!
//! Every guild gets a worker task fed by its own channel, so events of one
//! guild are handled strictly in arrival order while other guilds proceed in
//! parallel. A worker that has seen nothing for [`WORKER_IDLE`] retires; the
//! next event for that guild spawns a fresh one.

use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::GuildId;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, error::SendError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use super::Coordinator;
use crate::audio::backend::PlaybackEvent;

pub const WORKER_IDLE: Duration = Duration::from_secs(300);

type Workers = Arc<DashMap<GuildId, UnboundedSender<PlaybackEvent>>>;

#[derive(Clone)]
pub struct EventDispatcher {
    coordinator: Coordinator,
    workers: Workers,
}

impl EventDispatcher {
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            coordinator,
            workers: Arc::new(DashMap::new()),
        }
    }

    /// Drains the backend event stream until it closes.
    pub async fn run(self, mut events: UnboundedReceiver<PlaybackEvent>) {
        info!("📡 Event dispatcher started");
        while let Some(event) = events.recv().await {
            self.dispatch(event);
        }
        info!("📡 Backend event stream closed, dispatcher stopping");
    }

    /// Hands `event` to its guild's worker, spawning one if needed.
    pub fn dispatch(&self, mut event: PlaybackEvent) {
        let guild_id = event.guild_id();

        loop {
            // Sends happen under the entry lock, so a retiring worker cannot
            // miss an event that was routed to it.
            match self.workers.entry(guild_id) {
                Entry::Occupied(worker) => {
                    let sent = worker.get().send(event);
                    match sent {
                        Ok(()) => return,
                        Err(SendError(returned)) => {
                            worker.remove();
                            event = returned;
                        }
                    }
                }
                Entry::Vacant(slot) => {
                    let sender = self.spawn_worker(guild_id, event);
                    slot.insert(sender);
                    return;
                }
            }
        }
    }

    #[cfg(test)]
    pub fn active_workers(&self) -> usize {
        self.workers.len()
    }

    fn spawn_worker(&self, guild_id: GuildId, first: PlaybackEvent) -> UnboundedSender<PlaybackEvent> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let own = sender.clone();
        let workers = Arc::clone(&self.workers);
        let coordinator = self.coordinator.clone();

        debug!("🧵 Event worker started for guild {}", guild_id);
        tokio::spawn(async move {
            coordinator.handle_event(first).await;

            loop {
                match tokio::time::timeout(WORKER_IDLE, receiver.recv()).await {
                    Ok(Some(event)) => coordinator.handle_event(event).await,
                    Ok(None) => break,
                    Err(_) => {
                        let retired = workers
                            .remove_if(&guild_id, |_, current| {
                                current.same_channel(&own) && receiver.is_empty()
                            })
                            .is_some();
                        if retired {
                            break;
                        }
                    }
                }
            }

            debug!("🧵 Event worker for guild {} retired", guild_id);
        });

        sender
    }
}
