//! Listener registry and message fan-out.
//!
//! Decouples message production from however many subscribers happen to
//! exist. Registration and unregistration are synchronous and atomic;
//! broadcast serializes the message once and invokes every callback
//! with the same wire text. Fan-out order across subscribers carries no
//! meaning, but each subscriber sees successive broadcasts in send
//! order (callbacks run synchronously under the read lock).

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, warn};

use chirp_core::{ListenerId, OutboundMessage};

type Deliver = Box<dyn Fn(String) + Send + Sync>;

/// Mapping from listener ID to delivery callback.
#[derive(Default)]
pub struct Dispatcher {
    listeners: RwLock<HashMap<ListenerId, Deliver>>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `deliver` under a freshly generated ID and return it.
    pub fn register(&self, deliver: impl Fn(String) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId::new();
        let _ = self
            .listeners
            .write()
            .insert(id.clone(), Box::new(deliver));
        id
    }

    /// Remove the listener with the given ID. Unknown IDs are ignored.
    pub fn unregister(&self, id: &ListenerId) {
        let _ = self.listeners.write().remove(id);
    }

    /// Serialize `message` once and deliver it to every listener.
    pub fn send(&self, message: &OutboundMessage) {
        let Some(wire) = serialize(message) else {
            return;
        };
        let listeners = self.listeners.read();
        debug!(recipients = listeners.len(), "broadcasting message");
        for deliver in listeners.values() {
            deliver(wire.clone());
        }
    }

    /// Deliver `message` to a single listener, if it is registered.
    pub fn send_to(&self, id: &ListenerId, message: &OutboundMessage) {
        let Some(wire) = serialize(message) else {
            return;
        };
        if let Some(deliver) = self.listeners.read().get(id) {
            deliver(wire);
        }
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Whether no listeners are registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

fn serialize(message: &OutboundMessage) -> Option<String> {
    match message.to_wire() {
        Ok(wire) => Some(wire),
        Err(e) => {
            warn!(error = %e, "failed to serialize outbound message");
            None
        }
    }
}
