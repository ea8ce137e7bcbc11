//! Outbound wire messages.
//!
//! Every frame pushed to a subscriber is one of these, serialized as a
//! compact self-describing JSON object with a `tag` discriminator:
//!
//! - `{"tag":"tweet","data":<payload>}` — one unit of upstream content,
//!   with the payload JSON-decoded so subscribers receive structure, not
//!   a doubly-encoded string.
//! - `{"tag":"waiting","until":<epoch millis>}` — reconnection is
//!   deferred until the given absolute time.
//!
//! This is the wire contract subscribers parse; changing it breaks every
//! client.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// A message bound for every registered subscriber.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// One unit of upstream content, forwarded verbatim as decoded JSON.
    Tweet {
        /// The upstream payload.
        data: serde_json::Value,
    },
    /// Reconnection is deferred until this absolute time.
    Waiting {
        /// Unix epoch timestamp in milliseconds.
        until: i64,
    },
}

impl OutboundMessage {
    /// Build a [`OutboundMessage::Tweet`] from a raw upstream frame.
    ///
    /// The frame must be valid JSON; the caller decides what to do with
    /// frames that are not (the relay logs and drops them).
    pub fn tweet_from_raw(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::Tweet {
            data: serde_json::from_str(raw)?,
        })
    }

    /// Build a [`OutboundMessage::Waiting`] for an absolute deadline.
    #[must_use]
    pub fn waiting_until(until: i64) -> Self {
        Self::Waiting { until }
    }

    /// Build a [`OutboundMessage::Waiting`] for `delay_ms` from now.
    #[must_use]
    pub fn waiting_after_delay(delay_ms: u64) -> Self {
        let delay = i64::try_from(delay_ms).unwrap_or(i64::MAX);
        Self::Waiting {
            until: Utc::now().timestamp_millis().saturating_add(delay),
        }
    }

    /// Serialize to the wire form sent over the push channel.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn tweet_wire_form() {
        let msg = OutboundMessage::tweet_from_raw(r#"{"id":"1","text":"hi"}"#).unwrap();
        assert_eq!(
            msg.to_wire().unwrap(),
            r#"{"tag":"tweet","data":{"id":"1","text":"hi"}}"#
        );
    }

    #[test]
    fn tweet_payload_is_decoded_not_restringified() {
        let msg = OutboundMessage::tweet_from_raw(r#"{"n":1}"#).unwrap();
        assert_matches!(msg, OutboundMessage::Tweet { ref data } if data["n"] == 1);
    }

    #[test]
    fn tweet_from_invalid_json_is_an_error() {
        assert!(OutboundMessage::tweet_from_raw("not json").is_err());
    }

    #[test]
    fn waiting_wire_form() {
        let msg = OutboundMessage::waiting_until(1_700_000_000_000);
        assert_eq!(
            msg.to_wire().unwrap(),
            r#"{"tag":"waiting","until":1700000000000}"#
        );
    }

    #[test]
    fn waiting_after_delay_is_in_the_future() {
        let before = Utc::now().timestamp_millis();
        let msg = OutboundMessage::waiting_after_delay(60_000);
        let after = Utc::now().timestamp_millis();
        assert_matches!(msg, OutboundMessage::Waiting { until } => {
            assert!(until >= before + 60_000);
            assert!(until <= after + 60_000);
        });
    }

    #[test]
    fn wire_form_round_trips() {
        let msg = OutboundMessage::waiting_until(42);
        let back: OutboundMessage = serde_json::from_str(&msg.to_wire().unwrap()).unwrap();
        assert_eq!(back, msg);
    }
}
