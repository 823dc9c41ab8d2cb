use super::{Envelope, EnvelopeBody, RawMessage};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize, PartialEq)]
struct Order {
    id: u32,
    sku: String,
}

#[test]
fn test_raw_message_new_stamps_metadata() {
    let msg = RawMessage::new(b"{}".to_vec());
    assert_eq!(msg.id.len(), 32);
    assert_eq!(msg.attempts, 1);
    assert!(msg.timestamp > 0);
}

#[test]
fn test_redelivery_bumps_attempts_only() {
    let msg = RawMessage::new(b"{}".to_vec());
    let again = msg.redelivery();
    assert_eq!(again.attempts, 2);
    assert_eq!(again.id, msg.id);
    assert_eq!(again.body, msg.body);
}

#[test]
fn test_decode_with_reply_to() {
    let body = json!({ "replyTo": "orders.replies", "payload": { "id": 7, "sku": "A-1" } });
    let raw = RawMessage::new(body.to_string().into_bytes());

    let envelope = Envelope::decode(&raw).unwrap();
    assert_eq!(envelope.reply_to, "orders.replies");
    assert!(envelope.expects_reply());
    assert_eq!(envelope.id, raw.id);
    assert_eq!(envelope.attempts, 1);
    assert_eq!(envelope.body, raw.body);

    let order: Order = envelope.decode_payload().unwrap();
    assert_eq!(
        order,
        Order {
            id: 7,
            sku: "A-1".to_string()
        }
    );
}

#[test]
fn test_decode_without_reply_to() {
    let raw = RawMessage::new(br#"{"payload":"hello"}"#.to_vec());
    let envelope = Envelope::decode(&raw).unwrap();
    assert_eq!(envelope.reply_to, "");
    assert!(!envelope.expects_reply());
    assert_eq!(envelope.payload, json!("hello"));
}

#[test]
fn test_decode_empty_object_defaults_payload_to_null() {
    let raw = RawMessage::new(b"{}".to_vec());
    let envelope = Envelope::decode(&raw).unwrap();
    assert!(envelope.payload.is_null());
}

#[test]
fn test_decode_rejects_malformed_body() {
    let raw = RawMessage::new(b"not json".to_vec());
    assert!(Envelope::decode(&raw).is_err());
}

#[test]
fn test_decode_rejects_non_object_body() {
    let raw = RawMessage::new(b"42".to_vec());
    assert!(Envelope::decode(&raw).is_err());
}

#[test]
fn test_body_omits_empty_reply_to() {
    let bytes = EnvelopeBody::new(json!({ "ok": true })).to_bytes().unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value, json!({ "payload": { "ok": true } }));
}

#[test]
fn test_body_written_with_reply_to_decodes_back() {
    let bytes = EnvelopeBody::new(json!([1, 2]))
        .with_reply_to("replies")
        .to_bytes()
        .unwrap();
    let envelope = Envelope::decode(&RawMessage::new(bytes)).unwrap();
    assert_eq!(envelope.reply_to, "replies");
    assert_eq!(envelope.payload, json!([1, 2]));
}

#[test]
fn test_timestamp_utc_matches_nanos() {
    let mut raw = RawMessage::new(b"{}".to_vec());
    raw.timestamp = 1_725_000_000_000_000_000;
    let envelope = Envelope::decode(&raw).unwrap();
    assert_eq!(envelope.timestamp_utc().timestamp(), 1_725_000_000);
}
