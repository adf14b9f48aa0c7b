// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal event bus data: room timeline events and sync batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event type carrying chat messages.
pub const ROOM_MESSAGE: &str = "m.room.message";

/// One timeline event observed in a joined room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    #[serde(default)]
    pub event_id: String,
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub origin_server_ts: Option<i64>,
}

impl BusEvent {
    /// Builds an `m.room.message` event, mostly useful in tests.
    pub fn message(event_id: &str, sender: &str, content: Value) -> Self {
        Self {
            event_id: event_id.to_string(),
            event_type: ROOM_MESSAGE.to_string(),
            sender: sender.to_string(),
            content,
            origin_server_ts: None,
        }
    }

    pub fn is_room_message(&self) -> bool {
        self.event_type == ROOM_MESSAGE
    }

    /// `content.msgtype`, empty when absent.
    pub fn msgtype(&self) -> &str {
        self.content
            .get("msgtype")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// `content.body`, empty when absent.
    pub fn body(&self) -> &str {
        self.content
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// The event this one replies to.
    ///
    /// Reads the standard `m.relates_to.m.in_reply_to` relation first and
    /// falls back to a top-level `m.in_reply_to` object sent by older clients.
    pub fn in_reply_to(&self) -> Option<&str> {
        let relation = self
            .content
            .get("m.relates_to")
            .and_then(|r| r.get("m.in_reply_to"))
            .or_else(|| self.content.get("m.in_reply_to"));
        relation
            .and_then(|r| r.get("event_id"))
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Parameters of one long-poll request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// Cursor returned by the previous batch.
    pub since: Option<String>,
    /// How long the server may hold the request open.
    pub timeout: Duration,
    pub full_state: bool,
}

/// Events observed in one joined room, in feed order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RoomEvents {
    pub room_id: String,
    pub events: Vec<BusEvent>,
}

/// Result of one long-poll request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncBatch {
    pub next_batch: String,
    pub rooms: Vec<RoomEvents>,
}

impl SyncBatch {
    pub fn event_count(&self) -> usize {
        self.rooms.iter().map(|r| r.events.len()).sum()
    }
}
