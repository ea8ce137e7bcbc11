//! Reconnection backoff policy.
//!
//! Encodes the upstream provider's documented reconnection schedule,
//! which differs by failure class. The Nth consecutive failure of a
//! class waits on the delay accumulated from the first N−1 occurrences:
//! the increment rule is applied only *after* a wait completes.
//!
//! Delay sequences per class (milliseconds):
//!
//! - transient network: `0, 250, 500, …` capped at 16 000
//! - generic HTTP: `0, 5000, 10000, 20000, …` capped at 320 000
//! - rate limited (429): `0, 60000, 120000, …` doubling without a cap
//!
//! State is mutated only from the orchestrator's single loop; the lock
//! exists so a registration happening mid-wait can read the deadline.

use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::time;

const NETWORK_ERROR_STEP_MS: u64 = 250;
const NETWORK_ERROR_CAP_MS: u64 = 16_000;
const HTTP_ERROR_INITIAL_MS: u64 = 5_000;
const HTTP_ERROR_CAP_MS: u64 = 320_000;
const TOO_MANY_REQUESTS_INITIAL_MS: u64 = 60_000;

/// Failure category determining which increment rule applies.
///
/// Produced at the failure site, never inferred later by inspecting a
/// response structurally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackoffClass {
    /// Transient transport failure (DNS, connection reset, mid-stream
    /// read error).
    NetworkError,
    /// Non-2xx HTTP response other than 429.
    HttpError,
    /// HTTP 429. The upstream schedule doubles this one without an
    /// upper cap; the unbounded-delay asymmetry is deliberate and
    /// mirrors the provider's documentation.
    TooManyRequests,
}

impl BackoffClass {
    /// The delay to use after one more occurrence of this class.
    fn next_delay(self, current_ms: u64) -> u64 {
        match self {
            Self::NetworkError => (current_ms + NETWORK_ERROR_STEP_MS).min(NETWORK_ERROR_CAP_MS),
            Self::HttpError => {
                if current_ms == 0 {
                    HTTP_ERROR_INITIAL_MS
                } else {
                    (current_ms.saturating_mul(2)).min(HTTP_ERROR_CAP_MS)
                }
            }
            Self::TooManyRequests => {
                if current_ms == 0 {
                    TOO_MANY_REQUESTS_INITIAL_MS
                } else {
                    current_ms.saturating_mul(2)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct DelayState {
    delay_ms: u64,
    /// Absolute deadline of the wait currently in progress, if any.
    waiting_until: Option<i64>,
}

/// Tracks the single mutable delay and serializes waits so only one is
/// outstanding at a time per instance.
#[derive(Debug, Default)]
pub struct StreamDelay {
    state: Mutex<DelayState>,
}

impl StreamDelay {
    /// Create a policy with a zero delay and no wait outstanding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait out the current delay after a transient network failure,
    /// then apply the network increment rule.
    pub async fn wait_after_network_error(&self, before: impl FnOnce(u64)) {
        self.wait_and_bump(BackoffClass::NetworkError, before).await;
    }

    /// Wait out the current delay after a generic non-2xx HTTP failure,
    /// then apply the HTTP increment rule.
    pub async fn wait_after_http_error(&self, before: impl FnOnce(u64)) {
        self.wait_and_bump(BackoffClass::HttpError, before).await;
    }

    /// Wait out the current delay after a 429, then apply the
    /// rate-limit increment rule.
    pub async fn wait_after_too_many_requests(&self, before: impl FnOnce(u64)) {
        self.wait_and_bump(BackoffClass::TooManyRequests, before).await;
    }

    /// Capture the current delay, record the deadline, invoke `before`
    /// synchronously with the about-to-be-used delay (so the caller can
    /// notify subscribers ahead of the pause), sleep it out, then bump.
    async fn wait_and_bump(&self, class: BackoffClass, before: impl FnOnce(u64)) {
        let delay_ms = {
            let mut state = self.state.lock();
            let delay = i64::try_from(state.delay_ms).unwrap_or(i64::MAX);
            state.waiting_until = Some(Utc::now().timestamp_millis().saturating_add(delay));
            state.delay_ms
        };
        before(delay_ms);
        time::sleep(Duration::from_millis(delay_ms)).await;
        let mut state = self.state.lock();
        state.waiting_until = None;
        state.delay_ms = class.next_delay(state.delay_ms);
    }

    /// Invoke `f` with the deadline (epoch millis) of the wait in
    /// progress, only if one is outstanding. Never mutates state.
    pub fn if_waiting(&self, f: impl FnOnce(i64)) {
        let waiting_until = self.state.lock().waiting_until;
        if let Some(until) = waiting_until {
            f(until);
        }
    }

    /// Zero the delay and clear any recorded deadline.
    ///
    /// Issued after a successful stream completion; clearing the
    /// deadline matters only if a wait were somehow still recorded.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.delay_ms = 0;
        state.waiting_until = None;
    }
}
