// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound update filtering and translation.
//!
//! Decides whether a Telegram update may be relayed, then turns it into a
//! channel-agnostic [`InboundMessage`]. Inline keyboard presses become the
//! reply text a human would have typed, so approvals given by button and by
//! reply follow the same path.

use teloxide::types::{CallbackQuery, Message, User};
use tianshu_core::InboundMessage;

use crate::PLATFORM;

/// Checks whether the user may talk through the bridge.
///
/// Matches the numeric user id or the username (with or without `@`,
/// case-insensitive). An empty list allows everyone.
pub fn is_authorized(user: Option<&User>, allowed_users: &[String]) -> bool {
    if allowed_users.is_empty() {
        return true;
    }
    let Some(user) = user else {
        return false;
    };

    let user_id = user.id.0.to_string();
    allowed_users.iter().any(|allowed| {
        if *allowed == user_id {
            return true;
        }
        let allowed = allowed.strip_prefix('@').unwrap_or(allowed);
        user.username
            .as_deref()
            .is_some_and(|username| username.eq_ignore_ascii_case(allowed))
    })
}

/// Converts a message carrying text (or a captioned attachment).
///
/// Returns `None` for messages without any text.
pub fn to_inbound_message(msg: &Message) -> Option<InboundMessage> {
    let text = msg.text().or_else(|| msg.caption())?.trim();
    if text.is_empty() {
        return None;
    }
    Some(InboundMessage {
        channel: PLATFORM.to_string(),
        chat_id: msg.chat.id.0.to_string(),
        sender_id: sender_id(msg.from.as_ref()),
        message_id: Some(msg.id.0.to_string()),
        text: text.to_string(),
    })
}

/// Converts an inline keyboard press into the equivalent reply.
///
/// Callback data is `<action>:<request_id>` as produced by the renderer.
/// `approve` keeps the id so the reply targets that request; `reject` is
/// relayed bare and applies to the chat's latest pending request.
pub fn callback_reply(data: &str) -> Option<String> {
    let (action, request_id) = match data.split_once(':') {
        Some((action, id)) => (action, Some(id).filter(|id| !id.is_empty())),
        None => (data, None),
    };
    match (action, request_id) {
        ("approve", Some(id)) => Some(format!("approve {id}")),
        ("approve", None) => Some("approve".to_string()),
        ("reject", _) => Some("reject".to_string()),
        _ => None,
    }
}

/// Converts a keyboard press, when it maps to a reply and its chat is known.
pub fn callback_to_inbound(query: &CallbackQuery) -> Option<InboundMessage> {
    let text = callback_reply(query.data.as_deref()?)?;
    let chat_id = query.message.as_ref()?.chat().id;
    Some(InboundMessage {
        channel: PLATFORM.to_string(),
        chat_id: chat_id.0.to_string(),
        sender_id: sender_id(Some(&query.from)),
        message_id: None,
        text,
    })
}

fn sender_id(user: Option<&User>) -> String {
    user.map(|u| u.id.0.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
