//! # chirp-core
//!
//! Foundation types shared across the chirp relay: the outbound wire
//! messages pushed to subscribers and the branded listener ID.

#![deny(unsafe_code)]

pub mod ids;
pub mod messages;

pub use ids::ListenerId;
pub use messages::OutboundMessage;
