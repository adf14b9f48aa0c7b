// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` implements `ChannelAdapter` and captures every outbound text
//! and delivery for assertion in tests. Failures can be injected per call.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use tianshu_core::TianshuError;
use tianshu_core::traits::adapter::PluginAdapter;
use tianshu_core::traits::channel::ChannelAdapter;
use tianshu_core::types::{AdapterType, DeliveryTarget, HealthStatus, MessageId};

/// One captured call on a [`MockChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSend {
    Text {
        chat_id: String,
        text: String,
    },
    Delivery {
        target: DeliveryTarget,
        semantic_type: String,
        payload: Value,
    },
}

impl ChannelSend {
    pub fn chat_id(&self) -> &str {
        match self {
            Self::Text { chat_id, .. } => chat_id,
            Self::Delivery { target, .. } => &target.receive_id,
        }
    }
}

/// A mock external platform for testing.
pub struct MockChannel {
    platform: String,
    configured: bool,
    sent: Arc<Mutex<Vec<ChannelSend>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
}

impl MockChannel {
    /// A configured channel answering to `platform`.
    pub fn new(platform: &str) -> Self {
        Self {
            platform: platform.to_string(),
            configured: true,
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// A channel without credentials; every send fails with `NotConfigured`.
    pub fn unconfigured(platform: &str) -> Self {
        Self {
            configured: false,
            ..Self::new(platform)
        }
    }

    /// Makes the next send fail with a channel error carrying `message`.
    pub async fn fail_next(&self, message: &str) {
        self.failures.lock().await.push_back(message.to_string());
    }

    pub async fn sent(&self) -> Vec<ChannelSend> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    async fn record(&self, send: ChannelSend) -> Result<MessageId, TianshuError> {
        if !self.configured {
            return Err(TianshuError::NotConfigured {
                adapter: self.platform.clone(),
            });
        }
        if let Some(message) = self.failures.lock().await.pop_front() {
            return Err(TianshuError::channel(message));
        }
        self.sent.lock().await.push(send);
        Ok(MessageId(format!("mock-msg-{}", uuid::Uuid::new_v4())))
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TianshuError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TianshuError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn platform(&self) -> &str {
        &self.platform
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<MessageId, TianshuError> {
        self.record(ChannelSend::Text {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn deliver(
        &self,
        target: &DeliveryTarget,
        semantic_type: &str,
        payload: &Value,
    ) -> Result<MessageId, TianshuError> {
        self.record(ChannelSend::Delivery {
            target: target.clone(),
            semantic_type: semantic_type.to_string(),
            payload: payload.clone(),
        })
        .await
    }
}
