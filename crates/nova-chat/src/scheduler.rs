//! Re-engagement scheduler: a single-flight, cancellable idle timer.
//!
//! Two states: Armed (a quiet-period timer is running) and Disarmed. Every
//! qualifying state change (transcript append, typing flip) cancels the
//! running timer and recomputes the decision — a debounce, not a cron. The
//! elapse path re-reads current state through the engine, so a stale fire
//! can never act on an outdated "last message" snapshot.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::orchestrator::Inner;

pub(crate) struct ReengagementScheduler {
    quiet_period: Duration,
    engine: Mutex<Weak<Inner>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl ReengagementScheduler {
    pub(crate) fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            engine: Mutex::new(Weak::new()),
            timer: Mutex::new(None),
        }
    }

    /// Attach the engine after construction (the scheduler lives inside it).
    pub(crate) fn bind(&self, engine: Weak<Inner>) {
        *lock_recovering(&self.engine) = engine;
    }

    /// Cancel any running timer and recompute Armed/Disarmed from current
    /// state. Must be called after every transcript or typing-state change.
    pub(crate) fn reschedule(&self) {
        let Some(engine) = lock_recovering(&self.engine).upgrade() else {
            return;
        };

        let mut slot = lock_recovering(&self.timer);
        if let Some(handle) = slot.take() {
            handle.abort();
        }

        if !engine.nudge_premise_holds() {
            // Disarmed: the assistant spoke last, a reply is in flight, or
            // the conversation is empty.
            return;
        }

        let weak = Arc::downgrade(&engine);
        let quiet_period = self.quiet_period;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            if let Some(engine) = weak.upgrade() {
                engine.fire_nudge().await;
            }
        }));
    }

    /// Cancel the timer without rearming.
    pub(crate) fn disarm(&self) {
        if let Some(handle) = lock_recovering(&self.timer).take() {
            handle.abort();
        }
    }

    /// Whether a quiet-period timer is currently running.
    pub(crate) fn is_armed(&self) -> bool {
        lock_recovering(&self.timer)
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for ReengagementScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

fn lock_recovering<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
