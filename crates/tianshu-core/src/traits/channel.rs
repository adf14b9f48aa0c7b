// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound channel adapter trait for external chat platforms (Feishu, Telegram).

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TianshuError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DeliveryTarget, MessageId};

/// Adapter that transmits messages to one external chat platform.
///
/// An adapter built without credentials reports `is_configured() == false`
/// and fails every send with [`TianshuError::NotConfigured`].
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Platform identity matched against `target.channel` of delivery envelopes.
    fn platform(&self) -> &str;

    /// Whether the adapter holds the credentials it needs.
    fn is_configured(&self) -> bool;

    /// Sends relayed chat text to one chat.
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<MessageId, TianshuError>;

    /// Renders a semantic payload for this platform and sends it to the target.
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        semantic_type: &str,
        payload: &Value,
    ) -> Result<MessageId, TianshuError>;
}
