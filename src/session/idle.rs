//! Cancellable delayed disconnect, one per session.
//!
//! Every scheduled instance gets its own [`CancellationToken`] and a
//! generation number. The slot only ever remembers the latest instance, and
//! an expiring task must claim the slot under the same lock that `cancel`
//! takes. Whichever side gets the lock first wins: a successful `cancel`
//! means the action will never run, and an action that ran can no longer be
//! reported as cancelled. A stale task can never claim a newer instance
//! because the generations differ.

use parking_lot::Mutex;
use std::{future::Future, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
struct Slot {
    pending: Option<Pending>,
    generation: u64,
}

#[derive(Debug)]
struct Pending {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Clone, Default)]
pub struct IdleTimer {
    slot: Arc<Mutex<Slot>>,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer unless an action is already pending.
    ///
    /// Returns `false` without touching the pending action when one exists.
    pub fn schedule<F, Fut>(&self, delay: Duration, on_expire: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let armed = {
            let mut slot = self.slot.lock();
            if slot.pending.is_some() {
                debug!("⏳ Idle disconnect already pending, not scheduling another");
                return false;
            }
            Self::arm(&mut slot)
        };

        self.spawn(armed, delay, on_expire);
        true
    }

    /// Replaces any pending action with a fresh one.
    pub fn restart<F, Fut>(&self, delay: Duration, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let armed = {
            let mut slot = self.slot.lock();
            if let Some(previous) = slot.pending.take() {
                previous.token.cancel();
                debug!("⏳ Idle disconnect #{} superseded", previous.generation);
            }
            Self::arm(&mut slot)
        };

        self.spawn(armed, delay, on_expire);
    }

    /// Cancels the pending action. Returns `true` only if an action was
    /// pending and is now guaranteed not to run.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.pending.take() {
            Some(pending) => {
                pending.token.cancel();
                debug!("🛑 Idle disconnect #{} cancelled", pending.generation);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }

    fn arm(slot: &mut Slot) -> (u64, CancellationToken) {
        slot.generation += 1;
        let token = CancellationToken::new();
        slot.pending = Some(Pending {
            generation: slot.generation,
            token: token.clone(),
        });
        (slot.generation, token)
    }

    fn spawn<F, Fut>(&self, (generation, token): (u64, CancellationToken), delay: Duration, on_expire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let slot = Arc::clone(&self.slot);
        debug!("⏳ Idle disconnect #{} scheduled in {:?}", generation, delay);

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }

            let claimed = {
                let mut slot = slot.lock();
                let ours = slot
                    .pending
                    .as_ref()
                    .is_some_and(|pending| pending.generation == generation);
                if ours {
                    slot.pending = None;
                }
                ours
            };

            if claimed {
                debug!("⌛ Idle disconnect #{} fired", generation);
                on_expire().await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering::SeqCst};
    use tokio::time::sleep;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_delay() {
        let timer = IdleTimer::new();
        let fired = counter();

        assert!(timer.schedule(Duration::from_secs(10), bump(&fired)));
        assert!(timer.is_pending());

        sleep(Duration::from_secs(9)).await;
        assert_eq!(fired.load(SeqCst), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(SeqCst), 1);
        assert!(!timer.is_pending());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_schedule_is_rejected_while_pending() {
        let timer = IdleTimer::new();
        let first = counter();
        let second = counter();

        assert!(timer.schedule(Duration::from_secs(10), bump(&first)));
        assert!(!timer.schedule(Duration::from_secs(1), bump(&second)));

        sleep(Duration::from_secs(30)).await;
        assert_eq!(first.load(SeqCst), 1);
        assert_eq!(second.load(SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_deadline_prevents_fire() {
        let timer = IdleTimer::new();
        let fired = counter();

        timer.schedule(Duration::from_secs(10), bump(&fired));
        sleep(Duration::from_millis(9_999)).await;

        assert!(timer.cancel());
        assert!(!timer.cancel());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(fired.load(SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_fire_reports_nothing_cancelled() {
        let timer = IdleTimer::new();
        let fired = counter();

        timer.schedule(Duration::from_secs(1), bump(&fired));
        sleep(Duration::from_secs(2)).await;

        assert_eq!(fired.load(SeqCst), 1);
        assert!(!timer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_cancel_does_not_touch_new_instance() {
        let timer = IdleTimer::new();
        let old = counter();
        let new = counter();

        timer.schedule(Duration::from_secs(10), bump(&old));
        assert!(timer.cancel());

        assert!(timer.schedule(Duration::from_secs(10), bump(&new)));
        sleep(Duration::from_secs(11)).await;

        assert_eq!(old.load(SeqCst), 0);
        assert_eq!(new.load(SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_pending_instance() {
        let timer = IdleTimer::new();
        let old = counter();
        let new = counter();

        timer.schedule(Duration::from_secs(10), bump(&old));
        sleep(Duration::from_secs(5)).await;
        timer.restart(Duration::from_secs(10), bump(&new));

        sleep(Duration::from_secs(6)).await;
        assert_eq!(old.load(SeqCst), 0);
        assert_eq!(new.load(SeqCst), 0);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(old.load(SeqCst), 0);
        assert_eq!(new.load(SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_outcome_matches_fire_outcome_at_deadline() {
        let cases: Vec<(IdleTimer, Arc<AtomicUsize>)> = (0..200)
            .map(|_| {
                let timer = IdleTimer::new();
                let fired = counter();
                timer.schedule(Duration::from_millis(5), bump(&fired));
                (timer, fired)
            })
            .collect();

        sleep(Duration::from_millis(5)).await;
        let cancelled: Vec<bool> = cases.iter().map(|(timer, _)| timer.cancel()).collect();
        sleep(Duration::from_millis(100)).await;

        for ((_, fired), cancelled) in cases.iter().zip(cancelled) {
            let expected = if cancelled { 0 } else { 1 };
            assert_eq!(fired.load(SeqCst), expected);
        }
    }
}
