// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Envelopes carried inside internal event content.
//!
//! Three shapes travel over the bus: delivery envelopes (a business payload
//! addressed to one external chat), native card envelopes (an interactive
//! card posted into a room), and plain chat text.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::types::DeliveryTarget;

/// `msgtype` reserved for delivery envelopes.
pub const DELIVERY_MSGTYPE: &str = "tianshu.delivery";

/// `msgtype` of native interactive cards.
pub const CARD_MSGTYPE: &str = "m.card";

/// `format` marker of native interactive cards.
pub const CARD_FORMAT: &str = "org.matrix.msc1767.card";

/// Message types relayed as plain text.
pub const TEXT_MSGTYPES: &[&str] = &["m.text", "m.notice", "m.emote"];

fn default_semantic_type() -> String {
    "text".to_string()
}

/// A business payload addressed to one external chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryEnvelope {
    #[serde(default = "default_semantic_type")]
    pub semantic_type: String,
    pub target: DeliveryTarget,
    #[serde(default)]
    pub payload: Value,
}

impl DeliveryEnvelope {
    pub fn new(semantic_type: impl Into<String>, target: DeliveryTarget, payload: Value) -> Self {
        Self {
            semantic_type: semantic_type.into(),
            target,
            payload,
        }
    }

    /// Event content ready to be sent into a room.
    pub fn to_content(&self) -> Value {
        json!({
            "msgtype": DELIVERY_MSGTYPE,
            "body": format!("[delivery] {}", self.semantic_type),
            "semantic_type": self.semantic_type,
            "target": self.target,
            "payload": self.payload,
        })
    }

    /// Parses delivery content. Returns `None` when the target is not addressable.
    pub fn parse(content: &Value) -> Option<Self> {
        let envelope: Self = serde_json::from_value(content.clone()).ok()?;
        if !envelope.target.is_addressable() {
            return None;
        }
        let payload = if envelope.payload.is_object() {
            envelope.payload
        } else {
            json!({})
        };
        Some(Self {
            payload,
            ..envelope
        })
    }
}

fn content_msgtype(content: &Value) -> Option<&str> {
    content.get("msgtype").and_then(Value::as_str)
}

/// Whether the event is a delivery envelope, by argument or by content marker.
pub fn is_delivery_event(msg_type: &str, content: &Value) -> bool {
    msg_type == DELIVERY_MSGTYPE || content_msgtype(content) == Some(DELIVERY_MSGTYPE)
}

/// Whether the content is a native interactive card.
pub fn is_card_event(content: &Value) -> bool {
    content_msgtype(content) == Some(CARD_MSGTYPE)
        && content.get("format").and_then(Value::as_str) == Some(CARD_FORMAT)
}

/// Classification of one internal event for routing.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    /// A well-formed delivery envelope.
    Delivery(DeliveryEnvelope),
    /// Marked as a delivery but missing its channel or receive id.
    MalformedDelivery,
    /// A native interactive card; carries the raw content.
    Card(Value),
    /// Plain chat text.
    Text(String),
    /// Anything else (state events, media, empty bodies).
    Ignored,
}

impl InternalEvent {
    pub fn classify(msg_type: &str, content: &Value) -> Self {
        if is_delivery_event(msg_type, content) {
            return match DeliveryEnvelope::parse(content) {
                Some(envelope) => Self::Delivery(envelope),
                None => Self::MalformedDelivery,
            };
        }
        if is_card_event(content) {
            return Self::Card(content.clone());
        }
        if TEXT_MSGTYPES.contains(&msg_type) {
            let body = content
                .get("body")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim();
            if !body.is_empty() {
                return Self::Text(body.to_string());
            }
        }
        Self::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_content_carries_sentinel() {
        let env = DeliveryEnvelope::new(
            "approval_request",
            DeliveryTarget::new("feishu", "oc_1"),
            json!({"title": "t"}),
        );
        let content = env.to_content();
        assert_eq!(content["msgtype"], DELIVERY_MSGTYPE);
        assert_eq!(content["target"]["receive_id"], "oc_1");
        assert_eq!(DeliveryEnvelope::parse(&content), Some(env));
    }

    #[test]
    fn semantic_type_defaults_to_text() {
        let content = json!({
            "msgtype": DELIVERY_MSGTYPE,
            "target": {"channel": "telegram", "receive_id": "42"},
        });
        let env = DeliveryEnvelope::parse(&content).unwrap();
        assert_eq!(env.semantic_type, "text");
        assert_eq!(env.payload, json!({}));
    }

    #[test]
    fn missing_target_fields_are_malformed() {
        let no_receive_id = json!({"msgtype": DELIVERY_MSGTYPE, "target": {"channel": "feishu"}});
        assert_eq!(
            InternalEvent::classify("m.text", &no_receive_id),
            InternalEvent::MalformedDelivery
        );
        let no_target = json!({"msgtype": DELIVERY_MSGTYPE});
        assert_eq!(
            InternalEvent::classify(DELIVERY_MSGTYPE, &no_target),
            InternalEvent::MalformedDelivery
        );
    }

    #[test]
    fn sentinel_argument_alone_marks_delivery() {
        let content = json!({"target": {"channel": "feishu", "receive_id": "oc_1"}});
        assert!(is_delivery_event(DELIVERY_MSGTYPE, &content));
        assert!(matches!(
            InternalEvent::classify(DELIVERY_MSGTYPE, &content),
            InternalEvent::Delivery(_)
        ));
    }

    #[test]
    fn classifies_cards_and_text() {
        let card = json!({"msgtype": CARD_MSGTYPE, "format": CARD_FORMAT, "card_id": "c1"});
        assert!(matches!(
            InternalEvent::classify(CARD_MSGTYPE, &card),
            InternalEvent::Card(_)
        ));

        let text = json!({"msgtype": "m.text", "body": "  hello "});
        assert_eq!(
            InternalEvent::classify("m.text", &text),
            InternalEvent::Text("hello".into())
        );

        let image = json!({"msgtype": "m.image", "body": "pic.png"});
        assert_eq!(InternalEvent::classify("m.image", &image), InternalEvent::Ignored);
    }
}
