// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay of external chat messages into internal rooms.

use std::sync::Arc;

use serde_json::json;
use tianshu_core::{EventBus, InboundMessage};
use tracing::{debug, info, warn};

use crate::rooms::{AddressingMode, RoomRegistry};

/// Characters of the chat id used in auto-created room names.
const ROOM_NAME_CHAT_CHARS: usize = 12;

/// Forwards inbound platform messages to the room mapped to their chat.
pub struct InboundRelay {
    bus: Arc<dyn EventBus>,
    rooms: Arc<RoomRegistry>,
    auto_create_rooms: bool,
}

impl InboundRelay {
    pub fn new(bus: Arc<dyn EventBus>, rooms: Arc<RoomRegistry>, auto_create_rooms: bool) -> Self {
        Self {
            bus,
            rooms,
            auto_create_rooms,
        }
    }

    /// Relays one message and returns the id of the internal event.
    ///
    /// Returns `None` when the message is empty, no room can be found or
    /// created, or the bus rejects the send.
    pub async fn relay(&self, message: &InboundMessage) -> Option<String> {
        let text = message.text.trim();
        if text.is_empty() {
            debug!(channel = %message.channel, chat_id = %message.chat_id, "empty inbound message");
            return None;
        }
        let address = message.address().to_string();
        let room_id = self.room_for(message, &address).await?;
        self.rooms.bind(&address, &room_id);

        let content = json!({
            "msgtype": "m.text",
            "body": text,
            "tianshu.audit": {
                "message_id": message
                    .message_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                "sender": message.sender_id,
                "receiver": room_id,
                "channel": message.channel,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            },
        });
        match self.bus.send_event(&room_id, content).await {
            Ok(event_id) => {
                debug!(room_id = %room_id, chat = %address, event_id = %event_id, "relayed inbound message");
                Some(event_id)
            }
            Err(e) => {
                warn!(room_id = %room_id, chat = %address, error = %e, "inbound relay failed");
                None
            }
        }
    }

    async fn room_for(&self, message: &InboundMessage, address: &str) -> Option<String> {
        if let Some(room_id) = self.rooms.resolve(address) {
            return Some(room_id);
        }
        if !self.auto_create_rooms || matches!(self.rooms.mode(), AddressingMode::Shared(_)) {
            debug!(chat = %address, "no room mapped for chat");
            return None;
        }
        let short: String = message.chat_id.chars().take(ROOM_NAME_CHAT_CHARS).collect();
        let name = format!("{}-{short}", message.channel);
        match self.bus.create_room(&name).await {
            Ok(room_id) => {
                info!(room_id = %room_id, chat = %address, "created room for chat");
                Some(room_id)
            }
            Err(e) => {
                warn!(chat = %address, error = %e, "room creation failed");
                None
            }
        }
    }
}
