// Outbound payloads and per-tick batches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Separator between a poller namespace and a payload discriminator
pub const NAMESPACE_SEPARATOR: char = '.';

/// A single outbound message for the native side
///
/// Serializes as a flat JSON object whose discriminator lives under `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Payload {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Prefix the discriminator with `namespace`. An empty namespace is a no-op.
    pub fn namespaced(mut self, namespace: &str) -> Self {
        if !namespace.is_empty() {
            self.kind = format!("{}{}{}", namespace, NAMESPACE_SEPARATOR, self.kind);
        }
        self
    }
}

/// What a generator produced on one invocation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PollOutput {
    /// Nothing to send this tick
    #[default]
    None,
    One(Payload),
    Many(Vec<Payload>),
}

impl PollOutput {
    pub fn into_payloads(self) -> Vec<Payload> {
        match self {
            PollOutput::None => Vec::new(),
            PollOutput::One(payload) => vec![payload],
            PollOutput::Many(payloads) => payloads,
        }
    }
}

impl From<Payload> for PollOutput {
    fn from(payload: Payload) -> Self {
        PollOutput::One(payload)
    }
}

impl From<Vec<Payload>> for PollOutput {
    fn from(payloads: Vec<Payload>) -> Self {
        PollOutput::Many(payloads)
    }
}

impl From<Option<Payload>> for PollOutput {
    fn from(payload: Option<Payload>) -> Self {
        payload.map_or(PollOutput::None, PollOutput::One)
    }
}

/// All payloads produced by the due pollers of a single tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Correlation id for acknowledgement and logs
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub payloads: Vec<Payload>,
}

impl Batch {
    pub fn new(payloads: Vec<Payload>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payloads,
        }
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.payloads.iter().map(|p| p.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_serializes_type_field() {
        let payload = Payload::new("readAccelerometer").with_field("rate", 60);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({"type": "readAccelerometer", "rate": 60}));
    }

    #[test]
    fn test_payload_deserializes_flat_object() {
        let payload: Payload =
            serde_json::from_value(json!({"type": "scan", "timeout": 5})).unwrap();
        assert_eq!(payload.kind, "scan");
        assert_eq!(payload.fields.get("timeout"), Some(&json!(5)));
        assert!(!payload.fields.contains_key("type"));
    }

    #[test]
    fn test_namespaced_prefixes_kind() {
        let payload = Payload::new("poll").namespaced("bluetooth");
        assert_eq!(payload.kind, "bluetooth.poll");
    }

    #[test]
    fn test_empty_namespace_keeps_kind() {
        let payload = Payload::new("poll").namespaced("");
        assert_eq!(payload.kind, "poll");
    }

    #[test]
    fn test_poll_output_normalization() {
        assert!(PollOutput::None.into_payloads().is_empty());
        assert_eq!(PollOutput::from(Payload::new("a")).into_payloads().len(), 1);
        assert_eq!(
            PollOutput::from(vec![Payload::new("a"), Payload::new("b")])
                .into_payloads()
                .len(),
            2
        );
        assert_eq!(PollOutput::from(None::<Payload>), PollOutput::None);
    }

    #[test]
    fn test_batch_kinds_preserve_order() {
        let batch = Batch::new(vec![Payload::new("x"), Payload::new("y")]);
        assert_eq!(batch.kinds().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
    }
}
