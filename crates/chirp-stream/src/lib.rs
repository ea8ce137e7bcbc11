//! # chirp-stream
//!
//! The stream-resilience core of the relay: a single perpetually
//! reconnecting consumer of the upstream server-push endpoint, fanning
//! every received unit out to an arbitrary number of listeners.
//!
//! Components, composed bottom-up:
//!
//! - [`heartbeat::Heartbeat`] — liveness watchdog for one connection
//!   attempt; cancels the attempt when bytes stop arriving.
//! - [`delay::StreamDelay`] — the upstream provider's documented
//!   reconnection schedule, one increment rule per failure class.
//! - [`dispatcher::Dispatcher`] — listener registry with O(1)
//!   register/unregister/broadcast.
//! - [`relay::StreamRelay`] — owns the connect → stream → classify →
//!   wait → reconnect loop, started lazily on the first registration
//!   and never stopped.

#![deny(unsafe_code)]

pub mod delay;
pub mod dispatcher;
pub mod frames;
pub mod heartbeat;
pub mod options;
pub mod relay;

pub use delay::{BackoffClass, StreamDelay};
pub use dispatcher::Dispatcher;
pub use heartbeat::Heartbeat;
pub use options::{FieldSelection, StreamOptions};
pub use relay::{StreamError, StreamRelay};
