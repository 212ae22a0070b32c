//! Message data model
//!
//! Wire messages carry one of three body shapes (text, bytes, key/value map)
//! independent of the typed payload an application asks for. Provider-set
//! fields mirror what the broker stamps on delivery; custom properties use a
//! closed scalar union so an unsupported property type is unrepresentable on
//! the application side.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::transport::Acknowledger;

/// Closed union of property and map-entry values.
///
/// Used both for message properties and for map-shaped payloads. Any other
/// runtime type arriving from the transport is a data binding error at that
/// boundary, not a variant here.
///
/// Untagged serialization is lossy for `Byte`, which comes back as `Int`;
/// `Binary` serializes as a plain integer array. Messages travel between the
/// transport and the codec as `Value`s directly, so the serde representation
/// only matters for configuration and structured-data conversion, where the
/// widened form is acceptable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Byte(u8),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
}

/// Message destination, tagged as queue or topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Queue(String),
    Topic(String),
}

impl Destination {
    /// Destination name without the queue/topic tag
    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }
}

/// On-the-wire body shape, independent of the requested payload type.
#[derive(Debug, Clone, PartialEq)]
pub enum WireBody {
    Text(String),
    Bytes(Bytes),
    Map(HashMap<String, Value>),
}

/// A message as received from the broker.
///
/// Owned exclusively by the receiving call until handed to the dispatcher.
/// The `ack` handle is the only transport back-reference the message keeps,
/// retained solely to support an explicit acknowledge.
#[derive(Clone)]
pub struct Message {
    pub message_id: Option<String>,
    /// Broker-assigned delivery timestamp, epoch milliseconds
    pub timestamp: Option<i64>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<Destination>,
    pub destination: Option<Destination>,
    pub delivery_mode: u32,
    pub redelivered: bool,
    /// Application type tag, if the producer set one
    pub type_name: Option<String>,
    /// Expiration time, epoch milliseconds; `None` when the message never expires
    pub expiration: Option<i64>,
    pub priority: u8,
    pub properties: HashMap<String, Value>,
    pub body: WireBody,
    ack: Option<Arc<dyn Acknowledger>>,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Message")
            .field("message_id", &self.message_id)
            .field("destination", &self.destination)
            .field("redelivered", &self.redelivered)
            .field("properties", &self.properties)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

impl Message {
    /// Create a message with default provider fields around a body.
    pub fn new(body: WireBody) -> Self {
        Message {
            message_id: None,
            timestamp: None,
            correlation_id: None,
            reply_to: None,
            destination: None,
            delivery_mode: 0,
            redelivered: false,
            type_name: None,
            expiration: None,
            priority: 4,
            properties: HashMap::new(),
            body,
            ack: None,
        }
    }

    /// Attach the session-scoped acknowledge handle.
    pub fn with_ack(mut self, ack: Arc<dyn Acknowledger>) -> Self {
        self.ack = Some(ack);
        self
    }

    pub(crate) fn ack_handle(&self) -> Option<&Arc<dyn Acknowledger>> {
        self.ack.as_ref()
    }

    /// Whether the markup marker property is set to boolean `true`.
    pub fn markup_marker_set(&self) -> bool {
        matches!(self.properties.get(MARKUP_MARKER), Some(Value::Bool(true)))
    }
}

/// Property marking a text body as markup rather than plain text.
pub const MARKUP_MARKER: &str = "isMarkup";

/// A typed application payload, decoded from or encoded into a wire body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    /// Markup text; only produced when the markup marker property is set
    Markup(String),
    Binary(Vec<u8>),
    Map(HashMap<String, Value>),
    /// Structured data parsed from a bytes body or converted from a map body
    Structured(serde_json::Value),
}

/// Declared target type for payload decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadTarget {
    /// No declared shape; the wire body picks the representation
    Any,
    Text,
    Markup,
    Binary,
    /// `map<Value>` shaped payload
    ValueMap,
    /// Record/JSON-shaped payload, converted via the structured-data converter
    Structured,
}

/// A message to be produced, before encoding to a wire body.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub payload: Option<Payload>,
    pub correlation_id: Option<String>,
    pub type_name: Option<String>,
    pub properties: HashMap<String, Value>,
}

impl OutboundMessage {
    pub fn with_payload(payload: Payload) -> Self {
        OutboundMessage {
            payload: Some(payload),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_name() {
        assert_eq!(Destination::Queue("orders".into()).name(), "orders");
        assert_eq!(Destination::Topic("prices".into()).name(), "prices");
    }

    #[test]
    fn test_markup_marker_detection() {
        let mut message = Message::new(WireBody::Text("<a/>".into()));
        assert!(!message.markup_marker_set());

        message
            .properties
            .insert(MARKUP_MARKER.into(), Value::Bool(true));
        assert!(message.markup_marker_set());

        // A non-boolean marker does not count
        message
            .properties
            .insert(MARKUP_MARKER.into(), Value::Text("true".into()));
        assert!(!message.markup_marker_set());
    }

    #[test]
    fn test_new_message_defaults() {
        let message = Message::new(WireBody::Bytes(Bytes::from_static(b"x")));
        assert!(message.message_id.is_none());
        assert!(!message.redelivered);
        assert_eq!(message.priority, 4);
        assert!(message.ack_handle().is_none());
    }

    #[test]
    fn test_value_serde_round_trip() {
        let values = vec![
            Value::Bool(true),
            Value::Int(-42),
            Value::Float(2.5),
            Value::Text("hello".into()),
        ];
        for value in values {
            let json = serde_json::to_string(&value).unwrap();
            let back: Value = serde_json::from_str(&json).unwrap();
            assert_eq!(back, value);
        }
    }

    #[test]
    fn test_value_serde_widens_byte() {
        // Untagged representation: Byte comes back as Int
        let json = serde_json::to_string(&Value::Byte(5)).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Int(5));

        // Binary serializes as an integer array and still matches its own
        // variant on the way back
        let json = serde_json::to_string(&Value::Binary(vec![1, 2])).unwrap();
        assert_eq!(json, "[1,2]");
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::Binary(vec![1, 2]));
    }
}
