// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping between external chats and internal rooms.
//!
//! Chats are opaque strings here; the bridge passes qualified
//! [`ChatAddress`](tianshu_core::ChatAddress) strings such as `feishu:oc_1`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// How external chats are addressed on the internal bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressingMode {
    /// Every external chat resolves to this one room.
    Shared(String),
    /// Each external chat gets a room of its own.
    Private,
}

impl AddressingMode {
    /// Shared only when private rooms are off and a shared room is configured.
    pub fn from_settings(use_private_room: bool, shared_room_id: Option<&str>) -> Self {
        match shared_room_id.filter(|id| !id.is_empty()) {
            Some(room) if !use_private_room => Self::Shared(room.to_string()),
            _ => Self::Private,
        }
    }
}

#[derive(Debug, Default)]
struct RoomMaps {
    by_chat: HashMap<String, String>,
    /// Bound chats per room, first-seen order.
    by_room: HashMap<String, Vec<String>>,
}

impl RoomMaps {
    fn unlink(&mut self, chat_id: &str, room_id: &str) {
        if let Some(chats) = self.by_room.get_mut(room_id) {
            chats.retain(|c| c != chat_id);
            if chats.is_empty() {
                self.by_room.remove(room_id);
            }
        }
    }
}

/// Bidirectional chat/room registry.
#[derive(Debug)]
pub struct RoomRegistry {
    mode: AddressingMode,
    maps: Mutex<RoomMaps>,
}

impl RoomRegistry {
    pub fn new(mode: AddressingMode) -> Self {
        Self {
            mode,
            maps: Mutex::new(RoomMaps::default()),
        }
    }

    pub fn mode(&self) -> &AddressingMode {
        &self.mode
    }

    fn maps(&self) -> MutexGuard<'_, RoomMaps> {
        self.maps.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The internal room for a chat. Always the shared room in shared mode.
    pub fn resolve(&self, chat_id: &str) -> Option<String> {
        if let AddressingMode::Shared(room) = &self.mode {
            return Some(room.clone());
        }
        self.maps().by_chat.get(chat_id).cloned()
    }

    /// Associates a chat with a room, moving it out of any previous room.
    pub fn bind(&self, chat_id: &str, room_id: &str) {
        if chat_id.is_empty() || room_id.is_empty() {
            return;
        }
        let mut maps = self.maps();
        if let Some(previous) = maps.by_chat.insert(chat_id.to_string(), room_id.to_string()) {
            if previous != room_id {
                maps.unlink(chat_id, &previous);
            }
        }
        let chats = maps.by_room.entry(room_id.to_string()).or_default();
        if !chats.iter().any(|c| c == chat_id) {
            chats.push(chat_id.to_string());
        }
    }

    /// The first chat bound to the room.
    pub fn reverse_primary(&self, room_id: &str) -> Option<String> {
        self.maps()
            .by_room
            .get(room_id)
            .and_then(|chats| chats.first().cloned())
    }

    /// Every chat bound to the room, first-seen order.
    pub fn reverse_all(&self, room_id: &str) -> Vec<String> {
        self.maps().by_room.get(room_id).cloned().unwrap_or_default()
    }

    /// Drops the room and every chat pointing at it.
    pub fn forget(&self, room_id: &str) {
        let mut maps = self.maps();
        maps.by_room.remove(room_id);
        maps.by_chat.retain(|_, room| room != room_id);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn mode_from_settings() {
        assert_eq!(
            AddressingMode::from_settings(false, Some("!shared:hs")),
            AddressingMode::Shared("!shared:hs".into())
        );
        assert_eq!(AddressingMode::from_settings(true, Some("!shared:hs")), AddressingMode::Private);
        assert_eq!(AddressingMode::from_settings(false, None), AddressingMode::Private);
        assert_eq!(AddressingMode::from_settings(false, Some("")), AddressingMode::Private);
    }

    #[test]
    fn rebinding_dedupes_in_first_seen_order() {
        let rooms = RoomRegistry::new(AddressingMode::Private);
        rooms.bind("feishu:A", "!r:hs");
        rooms.bind("feishu:B", "!r:hs");
        rooms.bind("feishu:A", "!r:hs");
        assert_eq!(rooms.reverse_all("!r:hs"), vec!["feishu:A", "feishu:B"]);
        assert_eq!(rooms.reverse_primary("!r:hs").as_deref(), Some("feishu:A"));
    }

    #[test]
    fn binding_to_another_room_moves_the_chat() {
        let rooms = RoomRegistry::new(AddressingMode::Private);
        rooms.bind("telegram:1", "!old:hs");
        rooms.bind("telegram:2", "!old:hs");
        rooms.bind("telegram:1", "!new:hs");
        assert_eq!(rooms.resolve("telegram:1").as_deref(), Some("!new:hs"));
        assert_eq!(rooms.reverse_all("!old:hs"), vec!["telegram:2"]);
        assert_eq!(rooms.reverse_all("!new:hs"), vec!["telegram:1"]);
    }

    #[test]
    fn forget_removes_room_and_its_chats() {
        let rooms = RoomRegistry::new(AddressingMode::Private);
        rooms.bind("feishu:A", "!r:hs");
        rooms.bind("feishu:B", "!other:hs");
        rooms.forget("!r:hs");
        assert!(rooms.resolve("feishu:A").is_none());
        assert!(rooms.reverse_all("!r:hs").is_empty());
        assert_eq!(rooms.resolve("feishu:B").as_deref(), Some("!other:hs"));
    }

    #[test]
    fn shared_mode_resolves_everything_to_shared_room() {
        let rooms = RoomRegistry::new(AddressingMode::Shared("!s:hs".into()));
        assert_eq!(rooms.resolve("feishu:unbound").as_deref(), Some("!s:hs"));
        rooms.bind("feishu:A", "!s:hs");
        assert_eq!(rooms.reverse_all("!s:hs"), vec!["feishu:A"]);
    }

    #[test]
    fn empty_ids_are_ignored() {
        let rooms = RoomRegistry::new(AddressingMode::Private);
        rooms.bind("", "!r:hs");
        rooms.bind("feishu:A", "");
        assert!(rooms.reverse_all("!r:hs").is_empty());
        assert!(rooms.resolve("feishu:A").is_none());
    }

    proptest! {
        #[test]
        fn reverse_lists_stay_consistent(binds in prop::collection::vec((0u8..6, 0u8..3), 0..40)) {
            let rooms = RoomRegistry::new(AddressingMode::Private);
            for (chat, room) in &binds {
                rooms.bind(&format!("c{chat}"), &format!("!r{room}"));
            }
            for room in 0u8..3 {
                let room_id = format!("!r{room}");
                let chats = rooms.reverse_all(&room_id);
                let mut unique = chats.clone();
                unique.sort();
                unique.dedup();
                prop_assert_eq!(unique.len(), chats.len());
                for chat in &chats {
                    prop_assert_eq!(rooms.resolve(chat), Some(room_id.clone()));
                }
            }
        }
    }
}
