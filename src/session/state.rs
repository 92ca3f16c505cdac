use std::collections::VecDeque;
use tracing::{debug, info};

use crate::audio::track::TrackRef;

/// Repeat configuration for the last started track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    /// Replay this many more times.
    Remaining(u32),
    Forever,
}

impl LoopMode {
    pub fn times(times: u32) -> Self {
        if times == 0 {
            LoopMode::Off
        } else {
            LoopMode::Remaining(times)
        }
    }

    pub fn is_active(self) -> bool {
        !matches!(self, LoopMode::Off)
    }
}

/// What the player should do after the current track ends on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    /// Loop is active: play the last track again. Queue untouched.
    Replay(TrackRef),
    /// Head of the queue, now recorded as the last track.
    Advance(TrackRef),
    /// Nothing left to play.
    Exhausted,
}

/// Where a requested track ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Nothing was playing; the caller must start the track now.
    Start,
    /// Queued behind the current track, at this display position.
    Queued(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("The queue is full (max {max} tracks).")]
pub struct QueueFull {
    pub max: usize,
}

/// Mutable playback state of one guild.
///
/// The queue never holds the track currently playing; that one is mirrored
/// in `last_track`. `active` is set from the moment a track is claimed to
/// start until the queue runs dry, so concurrent requests decide between
/// starting and queueing under the same lock.
#[derive(Debug)]
pub struct SessionState {
    queue: VecDeque<TrackRef>,
    loop_mode: LoopMode,
    last_track: Option<TrackRef>,
    active: bool,
    max_size: usize,
}

impl SessionState {
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            loop_mode: LoopMode::Off,
            last_track: None,
            active: false,
            max_size,
        }
    }

    /// Appends a track and returns its 1-based display position, where the
    /// playing track is `#1`.
    pub fn enqueue(&mut self, track: TrackRef) -> Result<usize, QueueFull> {
        if self.queue.len() >= self.max_size {
            return Err(QueueFull { max: self.max_size });
        }

        info!("➕ Queued: {}", track.title);
        self.queue.push_back(track);
        Ok(self.queue.len() + 1)
    }

    /// Claims playback for `track` when idle, queues it otherwise.
    pub fn admit(&mut self, track: TrackRef) -> Result<Admission, QueueFull> {
        if self.active {
            return self.enqueue(track).map(Admission::Queued);
        }

        self.start(track);
        Ok(Admission::Start)
    }

    /// Records a track started directly, bypassing the queue.
    pub fn start(&mut self, track: TrackRef) {
        self.active = true;
        self.last_track = Some(track);
    }

    /// Marks playback as stopped, e.g. after the backend refused a track.
    /// Queued tracks stay put.
    pub fn halt(&mut self) {
        self.active = false;
        self.loop_mode = LoopMode::Off;
    }

    /// Nothing playing or starting, and nothing queued.
    pub fn is_idle(&self) -> bool {
        !self.active && self.queue.is_empty()
    }

    /// Decides what follows a naturally ended track.
    pub fn next_step(&mut self) -> NextStep {
        if self.loop_mode.is_active() {
            if let Some(last) = self.last_track.clone() {
                self.loop_mode = match self.loop_mode {
                    LoopMode::Remaining(n) => LoopMode::times(n - 1),
                    other => other,
                };
                debug!("🔂 Replaying {} (loop now {:?})", last.title, self.loop_mode);
                return NextStep::Replay(last);
            }
            self.loop_mode = LoopMode::Off;
        }

        match self.queue.pop_front() {
            Some(next) => {
                debug!("➡️ Next in queue: {}", next.title);
                self.last_track = Some(next.clone());
                NextStep::Advance(next)
            }
            None => {
                self.active = false;
                NextStep::Exhausted
            }
        }
    }

    /// Pops the head for a skip. Loop intent belongs to the skipped track,
    /// so it is cleared either way.
    pub fn skip_to_next(&mut self) -> Option<TrackRef> {
        self.loop_mode = LoopMode::Off;
        let Some(next) = self.queue.pop_front() else {
            self.active = false;
            return None;
        };
        self.start(next.clone());
        Some(next)
    }

    /// Puts a track back at the head, e.g. after a skip the backend refused.
    pub fn requeue_front(&mut self, track: TrackRef) {
        self.queue.push_front(track);
    }

    pub fn set_loop(&mut self, mode: LoopMode) {
        self.loop_mode = mode;
    }

    /// Flips between `Forever` and `Off`. Returns whether looping is now on.
    pub fn toggle_loop(&mut self) -> bool {
        self.loop_mode = if self.loop_mode.is_active() {
            LoopMode::Off
        } else {
            LoopMode::Forever
        };
        self.loop_mode.is_active()
    }

    pub fn queued(&self) -> Vec<TrackRef> {
        self.queue.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn loop_mode(&self) -> LoopMode {
        self.loop_mode
    }

    #[cfg(test)]
    pub fn last_track(&self) -> Option<&TrackRef> {
        self.last_track.as_ref()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
