// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of Feishu event subscription callbacks.

use serde_json::Value;
use tianshu_core::InboundMessage;

/// Event type of a received chat message (event schema 2.0).
pub const MESSAGE_RECEIVE_EVENT: &str = "im.message.receive_v1";

/// Body used when a message carries no readable text.
pub const NO_TEXT: &str = "(no text)";

/// What a Feishu callback asks of us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeishuEvent {
    /// Endpoint ownership check; echo the challenge back.
    UrlVerification { challenge: String },
    Message(InboundMessage),
    /// Any other event, or a message we cannot address.
    Ignored,
}

/// Parses one callback body.
pub fn parse_event(payload: &Value) -> FeishuEvent {
    if str_at(payload, &["type"]) == Some("url_verification") {
        return FeishuEvent::UrlVerification {
            challenge: str_at(payload, &["challenge"]).unwrap_or_default().to_string(),
        };
    }

    // Schema 2.0 carries the type in the header; older callbacks only carry the event.
    if let Some(event_type) = str_at(payload, &["header", "event_type"]) {
        if event_type != MESSAGE_RECEIVE_EVENT {
            return FeishuEvent::Ignored;
        }
    }

    let event = payload.get("event").unwrap_or(payload);
    let Some(message) = event.get("message") else {
        return FeishuEvent::Ignored;
    };
    let Some(chat_id) = str_at(message, &["chat_id"]).filter(|id| !id.is_empty()) else {
        return FeishuEvent::Ignored;
    };

    let sender_id = str_at(event, &["sender", "sender_id", "open_id"])
        .or_else(|| str_at(event, &["sender", "sender_id", "user_id"]))
        .filter(|id| !id.is_empty())
        .unwrap_or(chat_id);
    let message_type = str_at(message, &["message_type"]).unwrap_or("text");
    let text = message
        .get("content")
        .map(|content| message_text(message_type, content))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_TEXT.to_string());

    FeishuEvent::Message(InboundMessage {
        channel: "feishu".to_string(),
        chat_id: chat_id.to_string(),
        sender_id: sender_id.to_string(),
        message_id: str_at(message, &["message_id"]).map(str::to_string),
        text,
    })
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
}

/// Feishu sends `content` as a JSON-encoded string; plain strings are taken as text.
fn message_text(message_type: &str, content: &Value) -> String {
    let decoded = match content {
        Value::String(raw) if raw.trim_start().starts_with('{') => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        other => other.clone(),
    };
    let text = match (&decoded, message_type) {
        (Value::String(raw), _) => raw.clone(),
        (_, "post") => post_text(&decoded),
        _ => decoded
            .get("text")
            .or_else(|| decoded.get("content"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    };
    strip_mentions(&text)
}

/// Flattens a rich-text post: title, then each paragraph's text runs.
fn post_text(post: &Value) -> String {
    // Posts arrive either bare or keyed by locale (`zh_cn`, `en_us`).
    let body = if post.get("content").is_some() {
        post
    } else {
        post.as_object()
            .and_then(|locales| locales.values().next())
            .unwrap_or(post)
    };

    let mut lines = Vec::new();
    if let Some(title) = body.get("title").and_then(Value::as_str).filter(|t| !t.is_empty()) {
        lines.push(title.to_string());
    }
    for paragraph in body.get("content").and_then(Value::as_array).into_iter().flatten() {
        let line: String = paragraph
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|run| run.get("text").and_then(Value::as_str))
            .collect();
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Removes `@_user_N` mention placeholders, which group chats put before the text.
fn strip_mentions(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.split_whitespace()
                .filter(|word| !word.starts_with("@_user_") && *word != "@_all")
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
