//! Stream request options and their query-string encoding.
//!
//! The upstream endpoint takes its configuration as query parameters
//! with a stable encoding: nested objects are dot-flattened
//! (`media.fields`) and array values are comma-joined. The options
//! struct is the only externally settable input affecting the next
//! connection attempt's query string.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A list of requested fields for one object family.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelection {
    /// Field names to request.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

impl FieldSelection {
    /// Whether no fields are selected.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Options for the upstream stream request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    /// Expansions to request alongside each unit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expansions: Vec<String>,
    /// Media fields to include.
    #[serde(default, skip_serializing_if = "FieldSelection::is_empty")]
    pub media: FieldSelection,
    /// Tweet fields to include.
    #[serde(default, skip_serializing_if = "FieldSelection::is_empty")]
    pub tweet: FieldSelection,
    /// User fields to include.
    #[serde(default, skip_serializing_if = "FieldSelection::is_empty")]
    pub user: FieldSelection,
}

impl StreamOptions {
    /// Flatten into deterministic query pairs.
    ///
    /// Percent-encoding is left to the HTTP client; this only decides
    /// keys and values.
    #[must_use]
    pub fn to_query(&self) -> Vec<(String, String)> {
        match serde_json::to_value(self) {
            Ok(value) => {
                let mut pairs = Vec::new();
                flatten_into("", &value, &mut pairs);
                pairs
            }
            Err(e) => {
                // Unreachable for this type; encodability is the only
                // contract the options carry.
                warn!(error = %e, "stream options are not encodable");
                Vec::new()
            }
        }
    }
}

/// Recursive dot-flattening of a JSON value into query pairs.
///
/// Arrays are comma-joined from their scalar items; nulls and empty
/// arrays produce no pair.
fn flatten_into(prefix: &str, value: &Value, pairs: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&key, nested, pairs);
            }
        }
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().map(scalar_to_string).collect();
            if !joined.is_empty() {
                pairs.push((prefix.to_owned(), joined.join(",")));
            }
        }
        Value::Null => {}
        scalar => pairs.push((prefix.to_owned(), scalar_to_string(scalar))),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StreamOptions {
        StreamOptions {
            expansions: vec!["author_id".into()],
            media: FieldSelection {
                fields: vec!["height".into(), "width".into(), "url".into()],
            },
            tweet: FieldSelection {
                fields: vec!["id".into(), "text".into()],
            },
            user: FieldSelection {
                fields: vec!["username".into()],
            },
        }
    }

    #[test]
    fn arrays_are_comma_joined_and_objects_dot_flattened() {
        assert_eq!(
            sample().to_query(),
            vec![
                ("expansions".to_owned(), "author_id".to_owned()),
                ("media.fields".to_owned(), "height,width,url".to_owned()),
                ("tweet.fields".to_owned(), "id,text".to_owned()),
                ("user.fields".to_owned(), "username".to_owned()),
            ]
        );
    }

    #[test]
    fn empty_selections_produce_no_pairs() {
        let options = StreamOptions::default();
        assert!(options.to_query().is_empty());
    }

    #[test]
    fn partially_empty_selections_are_omitted() {
        let options = StreamOptions {
            expansions: vec!["author_id".into()],
            ..StreamOptions::default()
        };
        assert_eq!(
            options.to_query(),
            vec![("expansions".to_owned(), "author_id".to_owned())]
        );
    }

    #[test]
    fn encoding_is_deterministic() {
        let options = sample();
        assert_eq!(options.to_query(), options.to_query());
    }

    #[test]
    fn serde_round_trips() {
        let options = sample();
        let json = serde_json::to_string(&options).unwrap();
        let back: StreamOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }
}
