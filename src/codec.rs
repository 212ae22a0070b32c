//! Type-directed payload codec
//!
//! Converts between wire message bodies (text, bytes, key/value map) and
//! typed application payloads. Decoding is keyed by the wire body shape and
//! the declared target type; every mismatch is a data binding error, never a
//! silent default. Encoding is the symmetric direction used by the producer
//! path.
//!
//! Markup text travels as a text body with the [`MARKUP_MARKER`] property
//! set to boolean `true`; a `Markup` target without that marker is a
//! binding error, while a plain `Text` target accepts any text body.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::message::{
    Message, OutboundMessage, Payload, PayloadTarget, Value, WireBody, MARKUP_MARKER,
};

/// Decode a received message's body against a declared target type.
pub fn decode(message: &Message, target: PayloadTarget) -> Result<Payload> {
    match &message.body {
        WireBody::Text(text) => decode_text(text, message.markup_marker_set(), target),
        WireBody::Map(map) => decode_map(map, target),
        WireBody::Bytes(bytes) => decode_bytes(bytes, target),
    }
}

/// Decode a received message into a typed record via the structured path.
///
/// Map bodies are converted to a JSON object first; bytes bodies are parsed
/// as UTF-8 JSON. Text bodies cannot bind to records.
pub fn decode_into<T: serde::de::DeserializeOwned>(message: &Message) -> Result<T> {
    match decode(message, PayloadTarget::Structured)? {
        Payload::Structured(value) => serde_json::from_value(value)
            .map_err(|e| Error::data_binding(format!("Cannot convert payload to record: {e}"))),
        other => Err(Error::data_binding(format!(
            "Expected structured payload, found {other:?}"
        ))),
    }
}

fn decode_text(text: &str, markup: bool, target: PayloadTarget) -> Result<Payload> {
    match target {
        PayloadTarget::Any => {
            if markup {
                Ok(Payload::Markup(text.to_string()))
            } else {
                Ok(Payload::Text(text.to_string()))
            }
        }
        // A plain text target is always accepted, marker or not
        PayloadTarget::Text => Ok(Payload::Text(text.to_string())),
        PayloadTarget::Markup => {
            if markup {
                Ok(Payload::Markup(text.to_string()))
            } else {
                Err(Error::data_binding(
                    "Cannot bind text message to markup target. \
                     Message is missing the markup marker property",
                ))
            }
        }
        PayloadTarget::Binary | PayloadTarget::ValueMap | PayloadTarget::Structured => {
            Err(Error::data_binding(format!(
                "Cannot bind text message to type '{target:?}'. Expected 'text' or 'markup'"
            )))
        }
    }
}

fn decode_map(map: &HashMap<String, Value>, target: PayloadTarget) -> Result<Payload> {
    match target {
        PayloadTarget::Any | PayloadTarget::ValueMap => Ok(Payload::Map(map.clone())),
        PayloadTarget::Structured => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                object.insert(key.clone(), value_to_json(value)?);
            }
            Ok(Payload::Structured(serde_json::Value::Object(object)))
        }
        PayloadTarget::Text | PayloadTarget::Markup | PayloadTarget::Binary => {
            Err(Error::data_binding(format!(
                "Cannot bind map message to type '{target:?}'. Expected 'map<Value>'"
            )))
        }
    }
}

fn decode_bytes(bytes: &[u8], target: PayloadTarget) -> Result<Payload> {
    match target {
        PayloadTarget::Text | PayloadTarget::Markup => Err(Error::data_binding(format!(
            "Cannot bind bytes message to type '{target:?}'. \
             Use a text message for text/markup payloads"
        ))),
        PayloadTarget::ValueMap => Err(Error::data_binding(
            "Cannot bind bytes message to type 'ValueMap'. \
             Use a map message for map payloads",
        )),
        PayloadTarget::Any | PayloadTarget::Binary => Ok(Payload::Binary(bytes.to_vec())),
        PayloadTarget::Structured => {
            let text = std::str::from_utf8(bytes).map_err(|e| {
                Error::data_binding(format!("Bytes payload is not valid UTF-8: {e}"))
            })?;
            let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                Error::data_binding(format!("Cannot parse bytes payload as structured data: {e}"))
            })?;
            Ok(Payload::Structured(value))
        }
    }
}

/// Encode an outbound message into a wire message.
///
/// Text payloads become text bodies, markup payloads become text bodies with
/// the markup marker property set, binary payloads become bytes bodies, and
/// map payloads become map bodies. Structured payloads have no wire shape of
/// their own and are rejected. Correlation id, type tag, and custom
/// properties are carried over when present.
pub fn encode(outbound: &OutboundMessage) -> Result<Message> {
    let payload = outbound
        .payload
        .as_ref()
        .ok_or_else(|| Error::data_binding("Cannot encode a message without a payload"))?;

    let mut properties = outbound.properties.clone();
    let body = match payload {
        Payload::Text(text) => WireBody::Text(text.clone()),
        Payload::Markup(text) => {
            properties.insert(MARKUP_MARKER.to_string(), Value::Bool(true));
            WireBody::Text(text.clone())
        }
        Payload::Binary(bytes) => WireBody::Bytes(bytes.clone().into()),
        Payload::Map(map) => WireBody::Map(map.clone()),
        Payload::Structured(_) => {
            return Err(Error::data_binding(
                "Unsupported message content type 'Structured'. \
                 Encode text, binary, or map payloads",
            ))
        }
    };

    let mut message = Message::new(body);
    message.correlation_id = outbound.correlation_id.clone();
    message.type_name = outbound.type_name.clone();
    message.properties = properties;
    Ok(message)
}

/// Convert a property/map value into its structured-data representation.
fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    let json = match value {
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Byte(b) => serde_json::Value::Number((*b).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| {
                Error::data_binding(format!("Unsupported float value '{f}' in map payload"))
            })?,
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Binary(bytes) => serde_json::Value::Array(
            bytes.iter().map(|b| serde_json::Value::Number((*b).into())).collect(),
        ),
    };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn text_message(text: &str) -> Message {
        Message::new(WireBody::Text(text.into()))
    }

    fn markup_message(text: &str) -> Message {
        let mut message = text_message(text);
        message
            .properties
            .insert(MARKUP_MARKER.into(), Value::Bool(true));
        message
    }

    fn map_message(entries: &[(&str, Value)]) -> Message {
        let map = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Message::new(WireBody::Map(map))
    }

    fn bytes_message(bytes: &[u8]) -> Message {
        Message::new(WireBody::Bytes(bytes.to_vec().into()))
    }

    // ========== Text decode ==========

    #[test]
    fn test_text_to_any_yields_text() {
        let payload = decode(&text_message("hello"), PayloadTarget::Any).unwrap();
        assert_eq!(payload, Payload::Text("hello".into()));
    }

    #[test]
    fn test_text_to_any_yields_markup_when_marker_set() {
        let payload = decode(&markup_message("<a/>"), PayloadTarget::Any).unwrap();
        assert_eq!(payload, Payload::Markup("<a/>".into()));
    }

    #[test]
    fn test_text_target_accepts_marked_markup_body() {
        // Plain text target always accepted, even with the marker set
        let payload = decode(&markup_message("<a/>"), PayloadTarget::Text).unwrap();
        assert_eq!(payload, Payload::Text("<a/>".into()));
    }

    #[test]
    fn test_markup_target_requires_marker() {
        let err = decode(&text_message("<a/>"), PayloadTarget::Markup).unwrap_err();
        assert!(matches!(err, Error::DataBinding { .. }));
        assert!(err.to_string().contains("markup marker"));

        let payload = decode(&markup_message("<a/>"), PayloadTarget::Markup).unwrap();
        assert_eq!(payload, Payload::Markup("<a/>".into()));
    }

    #[test]
    fn test_text_rejects_map_and_binary_targets() {
        for target in [
            PayloadTarget::ValueMap,
            PayloadTarget::Binary,
            PayloadTarget::Structured,
        ] {
            let err = decode(&text_message("hello"), target).unwrap_err();
            assert!(matches!(err, Error::DataBinding { .. }), "{target:?}");
        }
    }

    // ========== Map decode ==========

    #[test]
    fn test_map_to_value_map() {
        let message = map_message(&[("a", Value::Int(1)), ("b", Value::Text("x".into()))]);
        let payload = decode(&message, PayloadTarget::ValueMap).unwrap();
        match payload {
            Payload::Map(map) => {
                assert_eq!(map.get("a"), Some(&Value::Int(1)));
                assert_eq!(map.get("b"), Some(&Value::Text("x".into())));
            }
            other => panic!("expected map payload, got {other:?}"),
        }
    }

    #[test]
    fn test_map_to_record() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Order {
            a: i64,
            b: String,
        }
        let message = map_message(&[("a", Value::Int(1)), ("b", Value::Text("x".into()))]);
        let order: Order = decode_into(&message).unwrap();
        assert_eq!(
            order,
            Order {
                a: 1,
                b: "x".into()
            }
        );
    }

    #[test]
    fn test_map_rejects_text_and_binary_targets() {
        let message = map_message(&[("a", Value::Int(1))]);
        for target in [
            PayloadTarget::Text,
            PayloadTarget::Markup,
            PayloadTarget::Binary,
        ] {
            let err = decode(&message, target).unwrap_err();
            assert!(matches!(err, Error::DataBinding { .. }), "{target:?}");
        }
    }

    #[test]
    fn test_map_with_nan_float_fails_structured_conversion() {
        let message = map_message(&[("bad", Value::Float(f64::NAN))]);
        let err = decode(&message, PayloadTarget::Structured).unwrap_err();
        assert!(matches!(err, Error::DataBinding { .. }));
    }

    // ========== Bytes decode ==========

    #[test]
    fn test_bytes_to_any_and_binary() {
        let message = bytes_message(b"\x01\x02\x03");
        for target in [PayloadTarget::Any, PayloadTarget::Binary] {
            let payload = decode(&message, target).unwrap();
            assert_eq!(payload, Payload::Binary(vec![1, 2, 3]));
        }
    }

    #[test]
    fn test_bytes_rejects_text_targets() {
        let message = bytes_message(b"hello");
        for target in [PayloadTarget::Text, PayloadTarget::Markup] {
            let err = decode(&message, target).unwrap_err();
            assert!(
                err.to_string().contains("Use a text message"),
                "{target:?}: {err}"
            );
        }
    }

    #[test]
    fn test_bytes_rejects_value_map_target() {
        let err = decode(&bytes_message(b"{}"), PayloadTarget::ValueMap).unwrap_err();
        assert!(err.to_string().contains("Use a map message"));
    }

    #[test]
    fn test_bytes_to_structured_parses_json() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Event {
            kind: String,
            count: u32,
        }
        let message = bytes_message(br#"{"kind":"tick","count":3}"#);
        let event: Event = decode_into(&message).unwrap();
        assert_eq!(
            event,
            Event {
                kind: "tick".into(),
                count: 3
            }
        );
    }

    #[test]
    fn test_bytes_to_structured_rejects_invalid_utf8_and_json() {
        let err = decode(&bytes_message(b"\xff\xfe"), PayloadTarget::Structured).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));

        let err = decode(&bytes_message(b"not json"), PayloadTarget::Structured).unwrap_err();
        assert!(matches!(err, Error::DataBinding { .. }));
    }

    // ========== Encode ==========

    #[test]
    fn test_encode_text_round_trip() {
        let outbound = OutboundMessage::with_payload(Payload::Text("hello".into()));
        let message = encode(&outbound).unwrap();
        assert_eq!(message.body, WireBody::Text("hello".into()));
        assert_eq!(
            decode(&message, PayloadTarget::Text).unwrap(),
            Payload::Text("hello".into())
        );
    }

    #[test]
    fn test_encode_markup_sets_marker_and_round_trips() {
        let outbound = OutboundMessage::with_payload(Payload::Markup("<a/>".into()));
        let message = encode(&outbound).unwrap();
        assert!(message.markup_marker_set());
        assert_eq!(
            decode(&message, PayloadTarget::Markup).unwrap(),
            Payload::Markup("<a/>".into())
        );
    }

    #[test]
    fn test_encode_bytes_round_trip() {
        let outbound = OutboundMessage::with_payload(Payload::Binary(vec![9, 8, 7]));
        let message = encode(&outbound).unwrap();
        assert_eq!(
            decode(&message, PayloadTarget::Binary).unwrap(),
            Payload::Binary(vec![9, 8, 7])
        );
    }

    #[test]
    fn test_encode_map_round_trip() {
        let map: HashMap<String, Value> = [
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::Text("x".into())),
        ]
        .into();
        let outbound = OutboundMessage::with_payload(Payload::Map(map.clone()));
        let message = encode(&outbound).unwrap();
        assert_eq!(
            decode(&message, PayloadTarget::ValueMap).unwrap(),
            Payload::Map(map)
        );
    }

    #[test]
    fn test_encode_structured_is_unsupported_content() {
        let outbound =
            OutboundMessage::with_payload(Payload::Structured(serde_json::json!({"a": 1})));
        let err = encode(&outbound).unwrap_err();
        assert!(err.to_string().contains("Unsupported message content type"));
    }

    #[test]
    fn test_encode_without_payload_fails() {
        let err = encode(&OutboundMessage::default()).unwrap_err();
        assert!(matches!(err, Error::DataBinding { .. }));
    }

    #[test]
    fn test_encode_carries_metadata() {
        let mut outbound = OutboundMessage::with_payload(Payload::Text("hi".into()));
        outbound.correlation_id = Some("corr-7".into());
        outbound.type_name = Some("greeting".into());
        outbound
            .properties
            .insert("weight".into(), Value::Float(0.5));

        let message = encode(&outbound).unwrap();
        assert_eq!(message.correlation_id.as_deref(), Some("corr-7"));
        assert_eq!(message.type_name.as_deref(), Some("greeting"));
        assert_eq!(message.properties.get("weight"), Some(&Value::Float(0.5)));
    }
}
