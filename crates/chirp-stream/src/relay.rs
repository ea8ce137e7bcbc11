//! The stream orchestrator.
//!
//! [`StreamRelay`] owns the perpetual connect → stream → classify →
//! wait → reconnect loop. The loop starts lazily on the first listener
//! registration and never stops; no failure inside it ever reaches a
//! caller. Exactly one upstream connection attempt is active at any
//! time.

use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chirp_core::{ListenerId, OutboundMessage};

use crate::delay::StreamDelay;
use crate::dispatcher::Dispatcher;
use crate::frames::{Frame, frame_lines};
use crate::heartbeat::Heartbeat;
use crate::options::StreamOptions;

/// Path of the upstream server-push endpoint.
const STREAM_PATH: &str = "/2/tweets/search/stream";

/// How one connection attempt ended, classified at the failure site.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Upstream answered 429.
    #[error("rate limited by upstream (429)")]
    RateLimited,

    /// Upstream answered with some other non-2xx status.
    #[error("upstream returned HTTP {status}")]
    Http {
        /// The response status code.
        status: u16,
    },

    /// The liveness watchdog cancelled the attempt. Locally detected,
    /// so it bypasses the backoff policy entirely.
    #[error("connection stalled past the liveness threshold")]
    Stalled,

    /// Transport-level failure (DNS, reset, mid-stream read error).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl StreamError {
    fn from_status(status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited
        } else {
            Self::Http {
                status: status.as_u16(),
            }
        }
    }
}

/// Manages the single upstream stream and fans its content out to
/// registered listeners.
///
/// Cheap to clone handles are not needed; the relay is held behind an
/// `Arc` by its callers and all methods take `&self`. Must live inside
/// a tokio runtime: the first registration spawns the stream loop.
pub struct StreamRelay {
    inner: Arc<RelayInner>,
}

struct RelayInner {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
    listeners: Dispatcher,
    delay: StreamDelay,
    options: RwLock<Option<StreamOptions>>,
    started: AtomicBool,
}

impl StreamRelay {
    /// Create a relay for the given upstream base URL and bearer
    /// credential. No connection is made until a listener registers.
    #[must_use]
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RelayInner {
                client: reqwest::Client::new(),
                base_url: base_url.into().trim_end_matches('/').to_owned(),
                bearer_token: bearer_token.into(),
                listeners: Dispatcher::new(),
                delay: StreamDelay::new(),
                options: RwLock::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener for the stream's content, returning its ID.
    ///
    /// The very first registration starts the stream loop; subsequent
    /// ones never re-trigger it. If a backoff wait is outstanding, the
    /// new listener is immediately sent one `waiting` message with the
    /// wait's deadline so it is not left uninformed.
    pub fn register_listener(
        &self,
        deliver: impl Fn(String) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = self.inner.listeners.register(deliver);
        if !self.inner.started.swap(true, Ordering::SeqCst) {
            info!("starting stream fetch");
            let inner = Arc::clone(&self.inner);
            drop(tokio::spawn(async move { inner.run().await }));
        }
        self.inner.delay.if_waiting(|until| {
            self.inner
                .listeners
                .send_to(&id, &OutboundMessage::waiting_until(until));
        });
        id
    }

    /// Unregister the listener with the given ID. Unknown IDs are
    /// ignored.
    pub fn unregister_listener(&self, id: &ListenerId) {
        self.inner.listeners.unregister(id);
    }

    /// Replace the options used for the next and all subsequent
    /// connection attempts. The in-flight attempt is unaffected.
    pub fn set_stream_options(&self, options: StreamOptions) {
        *self.inner.options.write() = Some(options);
    }

    /// Number of live listeners (diagnostic).
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl RelayInner {
    /// The perpetual reconnect loop. One attempt at a time; every
    /// failure is absorbed and converted into the next attempt.
    async fn run(&self) {
        loop {
            debug!("attempting stream");
            match self.stream_once().await {
                Ok(()) => {
                    info!("stream ended");
                    self.delay.reset();
                }
                Err(StreamError::Stalled) => {
                    warn!("connection stalled, retrying immediately");
                }
                Err(StreamError::RateLimited) => {
                    info!("429: too many requests");
                    self.delay
                        .wait_after_too_many_requests(|d| self.announce_wait(d))
                        .await;
                }
                Err(StreamError::Http { status }) => {
                    warn!(status, "HTTP error from upstream");
                    self.delay
                        .wait_after_http_error(|d| self.announce_wait(d))
                        .await;
                }
                Err(StreamError::Network(e)) => {
                    warn!(error = %e, "network error");
                    self.delay
                        .wait_after_network_error(|d| self.announce_wait(d))
                        .await;
                }
            }
        }
    }

    /// Log the retry schedule and broadcast the recorded deadline
    /// before the pause begins.
    fn announce_wait(&self, delay_ms: u64) {
        if delay_ms == 0 {
            info!("retrying immediately");
        } else {
            info!(delay_ms, "waiting before reconnecting");
        }
        self.delay.if_waiting(|until| {
            self.listeners.send(&OutboundMessage::waiting_until(until));
        });
    }

    /// Run one connection attempt from request to stream end.
    ///
    /// The watchdog is armed before the request goes out and its token
    /// covers both awaiting the response headers and every chunk read.
    async fn stream_once(&self) -> Result<(), StreamError> {
        let cancel = CancellationToken::new();
        let mut heartbeat = Heartbeat::new(cancel.clone());
        let url = format!("{}{STREAM_PATH}", self.base_url);
        let query = {
            let options = self.options.read();
            options.as_ref().map(StreamOptions::to_query).unwrap_or_default()
        };

        heartbeat.start();
        let request = self
            .client
            .get(&url)
            .query(&query)
            .bearer_auth(&self.bearer_token);
        let response = tokio::select! {
            resp = request.send() => resp?,
            () = cancel.cancelled() => return Err(StreamError::Stalled),
        };

        let status = response.status();
        if !status.is_success() {
            heartbeat.end();
            return Err(StreamError::from_status(status));
        }

        let mut frames = pin!(frame_lines(response.bytes_stream()));
        loop {
            tokio::select! {
                frame = frames.next() => match frame {
                    Some(Ok(Frame::KeepAlive)) => heartbeat.keep_alive(),
                    Some(Ok(Frame::Data(raw))) => {
                        heartbeat.keep_alive();
                        self.forward(&raw);
                    }
                    Some(Err(e)) => {
                        heartbeat.end();
                        return Err(StreamError::Network(e));
                    }
                    None => {
                        heartbeat.end();
                        return Ok(());
                    }
                },
                () = cancel.cancelled() => {
                    heartbeat.end();
                    return Err(StreamError::Stalled);
                }
            }
        }
    }

    /// Broadcast one data frame as a `tweet` message, preserving
    /// arrival order. Frames that are not valid JSON are dropped.
    fn forward(&self, raw: &str) {
        match OutboundMessage::tweet_from_raw(raw) {
            Ok(message) => self.listeners.send(&message),
            Err(e) => warn!(error = %e, "dropping frame that is not valid JSON"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_classifies_as_rate_limited() {
        let err = StreamError::from_status(reqwest::StatusCode::TOO_MANY_REQUESTS);
        assert!(matches!(err, StreamError::RateLimited));
    }

    #[test]
    fn other_non_2xx_classifies_as_http() {
        let err = StreamError::from_status(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, StreamError::Http { status: 500 }));
    }

    #[tokio::test]
    async fn unregister_unknown_listener_is_a_noop() {
        let relay = StreamRelay::new("http://127.0.0.1:9", "token");
        relay.unregister_listener(&ListenerId::from_string("ghost".into()));
        assert_eq!(relay.listener_count(), 0);
    }

    #[tokio::test]
    async fn registration_does_not_surface_failures() {
        // The loop will fail endlessly against an unroutable upstream;
        // registration still succeeds and returns an ID.
        let relay = StreamRelay::new("http://127.0.0.1:9", "token");
        let id = relay.register_listener(|_| {});
        assert_eq!(relay.listener_count(), 1);
        relay.unregister_listener(&id);
        assert_eq!(relay.listener_count(), 0);
    }
}
