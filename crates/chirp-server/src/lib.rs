//! # chirp-server
//!
//! The HTTP surface of the relay: a WebSocket endpoint bridging
//! subscribers onto the stream fan-out, a passthrough proxy for
//! upstream configuration endpoints, and process configuration.

#![deny(unsafe_code)]

pub mod config;
pub mod proxy;
pub mod server;
pub mod ws;

pub use config::{ConfigError, RelayConfig};
pub use server::{AppState, RelayServer};
