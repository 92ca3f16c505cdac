use dashmap::{mapref::entry::Entry, DashMap};
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::debug;

use super::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a session already exists for this guild")]
    AlreadyExists,
    #[error("the previous session of this guild is still closing")]
    Closing,
}

#[derive(Debug)]
enum Slot {
    /// Voice join in flight; invisible to `get`.
    Joining,
    Active(Arc<Session>),
}

/// Guild id to session map.
///
/// Backed by a sharded [`DashMap`], so guilds never contend with each other.
/// No map guard is ever held across an `.await`.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: DashMap<GuildId, Slot>,
    max_queue_size: usize,
}

impl SessionRegistry {
    pub fn new(max_queue_size: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_queue_size,
        }
    }

    /// Inserts a fresh session for `guild_id`.
    pub fn create(
        &self,
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
    ) -> Result<Arc<Session>, RegistryError> {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(occupied) => Err(Self::conflict(occupied.get())),
            Entry::Vacant(vacant) => {
                let session = Arc::new(Session::new(
                    guild_id,
                    voice_channel,
                    text_channel,
                    self.max_queue_size,
                ));
                vacant.insert(Slot::Active(Arc::clone(&session)));
                debug!("📒 Session created for guild {}", guild_id);
                Ok(session)
            }
        }
    }

    /// Claims the guild's slot while the backend join is in flight.
    ///
    /// Dropping the reservation without committing frees the slot again, so a
    /// failed join never leaves a session behind.
    pub fn reserve(&self, guild_id: GuildId) -> Result<Reservation<'_>, RegistryError> {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(occupied) => Err(Self::conflict(occupied.get())),
            Entry::Vacant(vacant) => {
                vacant.insert(Slot::Joining);
                Ok(Reservation {
                    registry: self,
                    guild_id,
                    committed: false,
                })
            }
        }
    }

    /// Active session of the guild. Sessions being torn down are not returned.
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions
            .get(&guild_id)
            .and_then(|slot| match slot.value() {
                Slot::Active(session) if !session.is_closing() => Some(Arc::clone(session)),
                _ => None,
            })
    }

    /// Removes the guild's active session, whatever its state.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions
            .remove_if(&guild_id, |_, slot| matches!(slot, Slot::Active(_)))
            .and_then(|(_, slot)| match slot {
                Slot::Active(session) => Some(session),
                Slot::Joining => None,
            })
    }

    /// Removes `session` only if it is still the one registered for its guild.
    pub fn remove_session(&self, session: &Arc<Session>) -> bool {
        self.sessions
            .remove_if(&session.guild_id(), |_, slot| {
                matches!(slot, Slot::Active(current) if Arc::ptr_eq(current, session))
            })
            .is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn conflict(slot: &Slot) -> RegistryError {
        match slot {
            Slot::Active(session) if session.is_closing() => RegistryError::Closing,
            _ => RegistryError::AlreadyExists,
        }
    }
}

/// Pending slot for a guild whose voice join has not completed yet.
#[derive(Debug)]
pub struct Reservation<'a> {
    registry: &'a SessionRegistry,
    guild_id: GuildId,
    committed: bool,
}

impl Reservation<'_> {
    /// Turns the reservation into the guild's active session.
    pub fn commit(mut self, voice_channel: ChannelId, text_channel: ChannelId) -> Arc<Session> {
        let session = Arc::new(Session::new(
            self.guild_id,
            voice_channel,
            text_channel,
            self.registry.max_queue_size,
        ));
        self.registry
            .sessions
            .insert(self.guild_id, Slot::Active(Arc::clone(&session)));
        self.committed = true;
        debug!("📒 Session created for guild {}", self.guild_id);
        session
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.registry
                .sessions
                .remove_if(&self.guild_id, |_, slot| matches!(slot, Slot::Joining));
        }
    }
}
