// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Alerts addressed to an owner's notification channels.

use std::sync::Arc;

use serde_json::{Value, json};
use tianshu_core::{DeliveryEnvelope, EventBus, OwnerDirectory, TianshuError};
use tianshu_render::SemanticType;
use tracing::{debug, warn};

/// Optional pointers attached to an owner alert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertLinks {
    pub related_entity_id: Option<String>,
    pub action_url: Option<String>,
}

/// Sends `alert_notification` delivery envelopes into the delivery room.
pub struct OwnerAlerter {
    bus: Arc<dyn EventBus>,
    directory: Arc<dyn OwnerDirectory>,
    delivery_room_id: Option<String>,
}

impl OwnerAlerter {
    pub fn new(
        bus: Arc<dyn EventBus>,
        directory: Arc<dyn OwnerDirectory>,
        delivery_room_id: Option<String>,
    ) -> Self {
        Self {
            bus,
            directory,
            delivery_room_id,
        }
    }

    /// Posts one envelope per enabled channel of the owner.
    ///
    /// Returns how many envelopes the bus accepted.
    pub async fn notify_owner_alert(
        &self,
        owner_id: &str,
        level: &str,
        title: &str,
        body: &str,
        links: AlertLinks,
    ) -> Result<usize, TianshuError> {
        let Some(room_id) = self.delivery_room_id.as_deref() else {
            return Err(TianshuError::Config(
                "bridge.delivery_room_id is required for owner alerts".to_string(),
            ));
        };
        let channels = self.directory.owner_channels(owner_id).await?;
        let mut payload = json!({"level": level, "title": title, "body": body});
        if let Some(related) = links.related_entity_id {
            payload["related_entity_id"] = Value::String(related);
        }
        if let Some(url) = links.action_url {
            payload["action_url"] = Value::String(url);
        }

        let mut sent = 0;
        for channel in channels.iter().filter(|c| c.enabled) {
            let envelope = DeliveryEnvelope::new(
                SemanticType::AlertNotification.to_string(),
                channel.target(),
                payload.clone(),
            );
            match self.bus.send_event(room_id, envelope.to_content()).await {
                Ok(_) => sent += 1,
                Err(e) => warn!(
                    owner_id,
                    channel = %channel.channel,
                    error = %e,
                    "owner alert not posted"
                ),
            }
        }
        if sent == 0 {
            debug!(owner_id, "owner has no reachable channel");
        }
        Ok(sent)
    }
}

#[cfg(test)]
mod tests {
    use tianshu_core::OwnerChannel;
    use tianshu_test_utils::MockBus;

    use super::*;
    use crate::directory::{KvOwnerDirectory, MemoryKv};

    async fn directory() -> Arc<KvOwnerDirectory> {
        let directory = Arc::new(KvOwnerDirectory::new(Arc::new(MemoryKv::new())));
        directory
            .set_owner_channels(
                "owner-1",
                vec![
                    OwnerChannel {
                        channel: "feishu".into(),
                        receive_id: "ou_1".into(),
                        receive_id_type: "open_id".into(),
                        enabled: true,
                    },
                    OwnerChannel {
                        channel: "telegram".into(),
                        receive_id: "42".into(),
                        receive_id_type: "chat_id".into(),
                        enabled: false,
                    },
                ],
            )
            .await
            .unwrap();
        directory
    }

    #[tokio::test]
    async fn one_envelope_per_enabled_channel() {
        let bus = MockBus::new("@bridge:mock");
        let alerter = OwnerAlerter::new(bus.clone(), directory().await, Some("!delivery:mock".into()));

        let sent = alerter
            .notify_owner_alert("owner-1", "critical", "Disk full", "/var at 99%", AlertLinks::default())
            .await
            .unwrap();
        assert_eq!(sent, 1);

        let events = bus.sent_to("!delivery:mock").await;
        assert_eq!(events.len(), 1);
        let envelope = DeliveryEnvelope::parse(&events[0].content).unwrap();
        assert_eq!(envelope.semantic_type, "alert_notification");
        assert_eq!(envelope.target.receive_id_type, "open_id");
        assert_eq!(envelope.payload["title"], "Disk full");
        assert!(envelope.payload.get("action_url").is_none());
    }

    #[tokio::test]
    async fn unknown_owner_sends_nothing() {
        let bus = MockBus::new("@bridge:mock");
        let alerter = OwnerAlerter::new(bus.clone(), directory().await, Some("!delivery:mock".into()));
        assert_eq!(alerter.notify_owner_alert("nobody", "info", "t", "b", AlertLinks::default()).await.unwrap(), 0);
        assert!(bus.sent().await.is_empty());
    }

    #[tokio::test]
    async fn delivery_room_is_required() {
        let bus = MockBus::new("@bridge:mock");
        let alerter = OwnerAlerter::new(bus, directory().await, None);
        let err = alerter.notify_owner_alert("owner-1", "info", "t", "b", AlertLinks::default()).await.unwrap_err();
        assert!(matches!(err, TianshuError::Config(_)));
    }

    #[tokio::test]
    async fn links_are_carried_in_the_payload() {
        let bus = MockBus::new("@bridge:mock");
        let alerter = OwnerAlerter::new(bus.clone(), directory().await, Some("!delivery:mock".into()));
        let links = AlertLinks {
            related_entity_id: Some("agent-7".into()),
            action_url: Some("https://console.example/agents/7".into()),
        };
        alerter
            .notify_owner_alert("owner-1", "warning", "Agent stalled", "", links)
            .await
            .unwrap();

        let events = bus.sent_to("!delivery:mock").await;
        let envelope = DeliveryEnvelope::parse(&events[0].content).unwrap();
        assert_eq!(envelope.payload["related_entity_id"], "agent-7");
        assert_eq!(envelope.payload["action_url"], "https://console.example/agents/7");
        let view = tianshu_render::fields::AlertView::from_payload(&envelope.payload);
        assert_eq!(view.related.as_deref(), Some("agent-7"));
    }
}
