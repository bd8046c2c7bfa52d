//! Binary "window ready" event between the producer and the consumer.
//!
//! `set` is callable from the tick context: it never blocks and never
//! allocates. `wait` suspends the consumer task until the flag is set and then
//! clears it (auto-reset). Multiple `set` calls before a `wait` coalesce into a
//! single wake-up, which is why `set` reports whether a signal was already
//! pending: the producer uses that to detect a consumer that fell a whole
//! window behind.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;

/// Auto-reset readiness flag, settable from a non-suspending context.
#[derive(Debug, Default)]
pub struct ReadySignal {
    pending: AtomicBool,
    raised: AtomicU64,
    notify: Notify,
}

impl ReadySignal {
    /// Create a cleared signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Returns `true` if it was still pending from an earlier `set`.
    pub fn set(&self) -> bool {
        let was_pending = self.pending.swap(true, Ordering::AcqRel);
        self.raised.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
        was_pending
    }

    /// Wait until the signal is raised, then clear it.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.pending.swap(false, Ordering::AcqRel) {
                return;
            }
            notified.await;
        }
    }

    /// Clear the signal if it is raised, without waiting.
    pub fn try_take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Whether a raised signal has not been consumed yet.
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Number of `set` calls since creation.
    pub fn raised_count(&self) -> u64 {
        self.raised.load(Ordering::Relaxed)
    }
}
