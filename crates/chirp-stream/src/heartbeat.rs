//! Liveness watchdog for one connection attempt.
//!
//! The upstream sends a keep-alive frame every ~20 seconds even when no
//! data matches, so a connection that goes silent for longer than the
//! stall threshold is dead regardless of what the transport thinks.
//! The watchdog cancels the attempt's [`CancellationToken`] when that
//! happens; it is the only cancellation source in the relay.
//!
//! One watchdog belongs to exactly one attempt: created when the
//! attempt begins, disarmed when it ends on any path (success, failure,
//! or drop).

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

/// How long the upstream may stay silent before the attempt is torn
/// down. Comfortably above the provider's ~20 s keep-alive cadence.
const STALL_THRESHOLD: Duration = Duration::from_millis(23_000);

struct Armed {
    pulse: mpsc::UnboundedSender<()>,
    stop: CancellationToken,
}

/// A restartable timeout guard bound to one in-flight connection
/// attempt.
///
/// On expiry the token supplied at construction is cancelled exactly
/// once; no further timer is armed until [`start`](Self::start) or
/// [`keep_alive`](Self::keep_alive) is called again. None of the
/// methods can fail.
pub struct Heartbeat {
    cancel: CancellationToken,
    threshold: Duration,
    armed: Option<Armed>,
}

impl Heartbeat {
    /// Create an unarmed watchdog that will cancel `cancel` on expiry.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            threshold: STALL_THRESHOLD,
            armed: None,
        }
    }

    /// Arm the timer for the stall threshold.
    ///
    /// Call this exactly once per attempt; use
    /// [`keep_alive`](Self::keep_alive) to push the deadline forward
    /// afterwards.
    pub fn start(&mut self) {
        let (pulse, mut rx) = mpsc::unbounded_channel::<()>();
        let stop = CancellationToken::new();
        let watcher_stop = stop.clone();
        let cancel = self.cancel.clone();
        let threshold = self.threshold;
        drop(tokio::spawn(async move {
            let mut deadline = Instant::now() + threshold;
            loop {
                tokio::select! {
                    () = time::sleep_until(deadline) => {
                        cancel.cancel();
                        return;
                    }
                    pulse = rx.recv() => match pulse {
                        Some(()) => deadline = Instant::now() + threshold,
                        None => return,
                    },
                    () = watcher_stop.cancelled() => return,
                }
            }
        }));
        self.armed = Some(Armed { pulse, stop });
    }

    /// Push the expiry deadline forward by the full threshold.
    ///
    /// Called on every received unit, keep-alive markers included. If
    /// no timer is armed yet this behaves exactly like
    /// [`start`](Self::start).
    pub fn keep_alive(&mut self) {
        match &self.armed {
            Some(armed) => {
                let _ = armed.pulse.send(());
            }
            None => self.start(),
        }
    }

    /// Disarm any outstanding timer and return to the unarmed state.
    ///
    /// Safe to call multiple times or before [`start`](Self::start).
    pub fn end(&mut self) {
        if let Some(armed) = self.armed.take() {
            armed.stop.cancel();
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;

    async fn advance(ms: u64) {
        time::advance(Duration::from_millis(ms)).await;
        yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn expires_at_the_threshold() {
        let token = CancellationToken::new();
        let mut hb = Heartbeat::new(token.clone());
        hb.start();
        yield_now().await;

        advance(22_999).await;
        assert!(!token.is_cancelled());
        advance(1).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_pushes_the_deadline_forward() {
        let token = CancellationToken::new();
        let mut hb = Heartbeat::new(token.clone());
        hb.start();
        yield_now().await;

        advance(5_000).await;
        hb.keep_alive();
        yield_now().await;

        // Original deadline (t=23000) passes without expiry...
        advance(18_000).await;
        assert!(!token.is_cancelled());
        // ...and the refreshed deadline holds until exactly t=28000.
        advance(4_999).await;
        assert!(!token.is_cancelled());
        advance(1).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn end_prevents_expiry() {
        let token = CancellationToken::new();
        let mut hb = Heartbeat::new(token.clone());
        hb.start();
        yield_now().await;

        advance(10_000).await;
        hb.end();
        advance(60_000).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn end_is_idempotent_and_safe_before_start() {
        let token = CancellationToken::new();
        let mut hb = Heartbeat::new(token.clone());
        hb.end();
        hb.start();
        hb.end();
        hb.end();
        advance(60_000).await;
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_arms_when_unarmed() {
        let token = CancellationToken::new();
        let mut hb = Heartbeat::new(token.clone());
        hb.keep_alive();
        yield_now().await;

        advance(23_000).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn drop_disarms() {
        let token = CancellationToken::new();
        let mut hb = Heartbeat::new(token.clone());
        hb.start();
        yield_now().await;
        drop(hb);

        advance(60_000).await;
        assert!(!token.is_cancelled());
    }
}
