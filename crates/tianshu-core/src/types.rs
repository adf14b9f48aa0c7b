// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapters, stores, and the dispatcher.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a message as assigned by the platform that accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Bus,
    Storage,
    Directory,
}

/// Lifecycle status of one outbound delivery attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
    Rejected,
    NoReply,
}

impl DeliveryStatus {
    /// Whether this status ends the delivery lifecycle.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

fn default_receive_id_type() -> String {
    "chat_id".to_string()
}

/// Where a delivery goes: platform name plus the platform's own addressing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTarget {
    /// Platform name, matched against [`ChannelAdapter::platform`](crate::traits::ChannelAdapter::platform).
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub receive_id: String,
    #[serde(default = "default_receive_id_type")]
    pub receive_id_type: String,
}

impl DeliveryTarget {
    pub fn new(channel: impl Into<String>, receive_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            receive_id: receive_id.into(),
            receive_id_type: default_receive_id_type(),
        }
    }

    pub fn with_receive_id_type(mut self, receive_id_type: impl Into<String>) -> Self {
        self.receive_id_type = receive_id_type.into();
        self
    }

    /// Both the channel and the receive id are present.
    pub fn is_addressable(&self) -> bool {
        !self.channel.trim().is_empty() && !self.receive_id.trim().is_empty()
    }
}

/// An external chat qualified by its platform, e.g. `feishu:oc_123`.
///
/// The room registry stores these in their string form so chats from
/// different platforms can share one internal room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatAddress {
    pub channel: String,
    pub chat_id: String,
}

impl ChatAddress {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Parses `channel:chat_id`. Returns `None` when either half is empty.
    pub fn parse(s: &str) -> Option<Self> {
        let (channel, chat_id) = s.split_once(':')?;
        if channel.is_empty() || chat_id.is_empty() {
            return None;
        }
        Some(Self::new(channel, chat_id))
    }
}

impl fmt::Display for ChatAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.chat_id)
    }
}

/// A plain chat message received from an external platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform name (`feishu`, `telegram`).
    pub channel: String,
    pub chat_id: String,
    pub sender_id: String,
    /// Platform message id, when the platform supplies one.
    pub message_id: Option<String>,
    pub text: String,
}

impl InboundMessage {
    pub fn address(&self) -> ChatAddress {
        ChatAddress::new(&self.channel, &self.chat_id)
    }
}

/// One notification target of an owner, as held by the identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerChannel {
    pub channel: String,
    pub receive_id: String,
    #[serde(default = "default_receive_id_type")]
    pub receive_id_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl OwnerChannel {
    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget::new(&self.channel, &self.receive_id)
            .with_receive_id_type(&self.receive_id_type)
    }
}

/// Truncates to at most `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
