// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing of internal room events to external platforms.
//!
//! Every event observed by the bridge identity goes through
//! [`Dispatcher::on_internal_event`]: delivery envelopes are rendered and sent
//! to their one target with a ledger record, native cards are fanned out as
//! approval requests, and plain chat text is relayed to every bound chat.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tianshu_core::types::truncate_chars;
use tianshu_core::{
    BusEvent, ChannelAdapter, ChatAddress, DeliveryEnvelope, DeliveryStatus, DeliveryTarget,
    EventHandler, InternalEvent, MessageId, TianshuError,
};
use tianshu_delivery::{DeliveryLog, ledger::PAYLOAD_SUMMARY_MAX_CHARS};
use tianshu_render::{SemanticType, card_payload};
use tracing::{debug, info, warn};

use crate::rooms::RoomRegistry;

/// Default bound on one outbound platform call.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Routes internal events to the channel adapters.
pub struct Dispatcher {
    adapters: Vec<Arc<dyn ChannelAdapter>>,
    ledger: Arc<dyn DeliveryLog>,
    rooms: Arc<RoomRegistry>,
    self_user_id: String,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(ledger: Arc<dyn DeliveryLog>, rooms: Arc<RoomRegistry>, self_user_id: impl Into<String>) -> Self {
        Self {
            adapters: Vec::new(),
            ledger,
            rooms,
            self_user_id: self_user_id.into(),
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn ChannelAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn adapters(&self) -> &[Arc<dyn ChannelAdapter>] {
        &self.adapters
    }

    fn adapter(&self, platform: &str) -> Option<&Arc<dyn ChannelAdapter>> {
        self.adapters.iter().find(|a| a.platform() == platform)
    }

    /// Routes one internal event. Returns whether anything was sent.
    pub async fn on_internal_event(&self, room_id: &str, msg_type: &str, content: &Value) -> bool {
        self.route(room_id, InternalEvent::classify(msg_type, content)).await
    }

    async fn route(&self, room_id: &str, event: InternalEvent) -> bool {
        match event {
            InternalEvent::Delivery(envelope) => self.deliver_envelope(&envelope).await,
            InternalEvent::MalformedDelivery => {
                debug!(room_id, "delivery envelope without channel or receive_id");
                false
            }
            InternalEvent::Card(content) => self.fan_out_card(room_id, &content).await,
            InternalEvent::Text(text) => self.fan_out_text(room_id, &text).await,
            InternalEvent::Ignored => false,
        }
    }

    async fn deliver_envelope(&self, envelope: &DeliveryEnvelope) -> bool {
        let Some(adapter) = self.adapter(&envelope.target.channel) else {
            debug!(channel = %envelope.target.channel, "no adapter for delivery channel");
            return false;
        };
        self.send_delivery(adapter, &envelope.target, &envelope.semantic_type, &envelope.payload)
            .await
    }

    /// Ledgered send of one semantic payload.
    async fn send_delivery(
        &self,
        adapter: &Arc<dyn ChannelAdapter>,
        target: &DeliveryTarget,
        semantic_type: &str,
        payload: &Value,
    ) -> bool {
        let summary = truncate_chars(&payload.to_string(), PAYLOAD_SUMMARY_MAX_CHARS);
        let delivery_id = self.ledger.start(semantic_type, target, &summary);

        let result = if adapter.is_configured() {
            self.bounded(adapter.deliver(target, semantic_type, payload)).await
        } else {
            Err(TianshuError::NotConfigured {
                adapter: adapter.platform().to_string(),
            })
        };

        match result {
            Ok(message_id) => {
                self.ledger
                    .complete(&delivery_id, DeliveryStatus::Delivered, Some(&message_id.0), None);
                info!(
                    delivery_id = %delivery_id,
                    channel = %target.channel,
                    receive_id = %target.receive_id,
                    semantic_type,
                    "delivery sent"
                );
                true
            }
            Err(e) => {
                self.ledger
                    .complete(&delivery_id, DeliveryStatus::Failed, None, Some(&e.reason()));
                warn!(
                    delivery_id = %delivery_id,
                    channel = %target.channel,
                    receive_id = %target.receive_id,
                    error = %e,
                    "delivery failed"
                );
                false
            }
        }
    }

    async fn bounded<F>(&self, send: F) -> Result<MessageId, TianshuError>
    where
        F: std::future::Future<Output = Result<MessageId, TianshuError>>,
    {
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(result) => result,
            Err(_) => Err(TianshuError::Timeout {
                duration: self.send_timeout,
            }),
        }
    }

    /// Bound chats of the room with the adapter that serves each.
    fn bound_chats(&self, room_id: &str) -> Vec<(ChatAddress, &Arc<dyn ChannelAdapter>)> {
        self.rooms
            .reverse_all(room_id)
            .into_iter()
            .filter_map(|chat| {
                let Some(address) = ChatAddress::parse(&chat) else {
                    debug!(room_id, chat = %chat, "bound chat is not a channel address");
                    return None;
                };
                match self.adapter(&address.channel) {
                    Some(adapter) => Some((address, adapter)),
                    None => {
                        debug!(room_id, chat = %chat, "no adapter for bound chat");
                        None
                    }
                }
            })
            .collect()
    }

    async fn fan_out_card(&self, room_id: &str, content: &Value) -> bool {
        let payload = card_payload(content);
        let semantic_type = SemanticType::ApprovalRequest.to_string();
        let mut any = false;
        for (address, adapter) in self.bound_chats(room_id) {
            let target = DeliveryTarget::new(&address.channel, &address.chat_id);
            any |= self.send_delivery(adapter, &target, &semantic_type, &payload).await;
        }
        any
    }

    async fn fan_out_text(&self, room_id: &str, text: &str) -> bool {
        let chats = self.bound_chats(room_id);
        if chats.is_empty() {
            debug!(room_id, "no external chat bound to room");
            return false;
        }
        let mut any = false;
        for (address, adapter) in chats {
            match self.bounded(adapter.send_text(&address.chat_id, text)).await {
                Ok(message_id) => {
                    debug!(room_id, chat = %address, message_id = %message_id, "relayed text");
                    any = true;
                }
                Err(e) => warn!(room_id, chat = %address, error = %e, "text relay failed"),
            }
        }
        any
    }
}

#[async_trait]
impl EventHandler for Dispatcher {
    async fn handle(&self, room_id: &str, event: &BusEvent) -> Result<(), TianshuError> {
        if !event.is_room_message() {
            return Ok(());
        }
        let internal = InternalEvent::classify(event.msgtype(), &event.content);
        // Envelopes posted by the bridge itself (owner alerts) still go out;
        // its own relayed text and cards would only echo back.
        if event.sender == self.self_user_id && !matches!(internal, InternalEvent::Delivery(_)) {
            return Ok(());
        }
        self.route(room_id, internal).await;
        Ok(())
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let platforms: Vec<&str> = self.adapters.iter().map(|a| a.platform()).collect();
        f.debug_struct("Dispatcher")
            .field("platforms", &platforms)
            .field("self_user_id", &self.self_user_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tianshu_core::envelope::DELIVERY_MSGTYPE;
    use tianshu_delivery::{DeliveryQuery, InMemoryLedger};
    use tianshu_render::{ApprovalCardRequest, approval_card};
    use tianshu_core::OwnerChannel;
    use tianshu_test_utils::{ChannelSend, MockBus, MockChannel};
    use tracing_test::traced_test;

    use super::*;
    use crate::alert::{AlertLinks, OwnerAlerter};
    use crate::directory::{KvOwnerDirectory, MemoryKv};
    use crate::rooms::AddressingMode;

    struct Fixture {
        dispatcher: Dispatcher,
        ledger: Arc<InMemoryLedger>,
        rooms: Arc<RoomRegistry>,
        feishu: Arc<MockChannel>,
        telegram: Arc<MockChannel>,
    }

    fn fixture_with(feishu: MockChannel) -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new(100));
        let rooms = Arc::new(RoomRegistry::new(AddressingMode::Private));
        let feishu = Arc::new(feishu);
        let telegram = Arc::new(MockChannel::new("telegram"));
        let dispatcher = Dispatcher::new(ledger.clone(), rooms.clone(), "@bridge:hs")
            .with_adapter(feishu.clone())
            .with_adapter(telegram.clone());
        Fixture {
            dispatcher,
            ledger,
            rooms,
            feishu,
            telegram,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockChannel::new("feishu"))
    }

    fn delivery(channel: &str, receive_id: &str) -> Value {
        DeliveryEnvelope::new(
            "alert_notification",
            DeliveryTarget::new(channel, receive_id),
            json!({"level": "warning", "title": "disk"}),
        )
        .to_content()
    }

    #[tokio::test]
    async fn delivery_is_sent_and_ledgered() {
        let f = fixture();
        assert!(f.dispatcher.on_internal_event("!r:hs", DELIVERY_MSGTYPE, &delivery("feishu", "oc_1")).await);

        let sent = f.feishu.sent().await;
        assert_eq!(sent.len(), 1);
        let ChannelSend::Delivery { semantic_type, .. } = &sent[0] else {
            panic!("expected a delivery");
        };
        assert_eq!(semantic_type, "alert_notification");
        assert_eq!(f.telegram.sent_count().await, 0);

        let page = f.ledger.query(&DeliveryQuery::default(), 10);
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].status, DeliveryStatus::Delivered);
        assert!(page.items[0].platform_message_id.as_deref().unwrap().starts_with("mock-msg-"));
    }

    #[tokio::test]
    async fn envelope_is_recognized_by_content_marker() {
        let f = fixture();
        assert!(f.dispatcher.on_internal_event("!r:hs", "m.text", &delivery("telegram", "42")).await);
        assert_eq!(f.telegram.sent_count().await, 1);
    }

    #[tokio::test]
    async fn malformed_or_foreign_deliveries_are_skipped() {
        let f = fixture();
        let missing = json!({"msgtype": DELIVERY_MSGTYPE, "target": {"channel": "feishu"}});
        assert!(!f.dispatcher.on_internal_event("!r:hs", DELIVERY_MSGTYPE, &missing).await);
        assert!(!f.dispatcher.on_internal_event("!r:hs", DELIVERY_MSGTYPE, &delivery("slack", "C1")).await);
        assert!(f.ledger.is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_delivery_is_recorded_with_reason() {
        let f = fixture();
        f.feishu.fail_next("quota exceeded").await;
        assert!(!f.dispatcher.on_internal_event("!r:hs", DELIVERY_MSGTYPE, &delivery("feishu", "oc_1")).await);
        let record = &f.ledger.recent(1)[0];
        assert_eq!(record.status, DeliveryStatus::Failed);
        assert!(record.error_reason.as_deref().unwrap().contains("quota exceeded"));
        assert!(logs_contain("delivery failed"));
    }

    #[tokio::test]
    async fn unconfigured_adapter_fails_fast() {
        let f = fixture_with(MockChannel::unconfigured("feishu"));
        assert!(!f.dispatcher.on_internal_event("!r:hs", DELIVERY_MSGTYPE, &delivery("feishu", "oc_1")).await);
        let record = &f.ledger.recent(1)[0];
        assert_eq!(record.status, DeliveryStatus::Failed);
        assert_eq!(record.error_reason.as_deref(), Some("not_configured"));
    }

    #[tokio::test]
    async fn text_fans_out_to_every_bound_chat() {
        let f = fixture();
        f.rooms.bind("feishu:oc_1", "!r:hs");
        f.rooms.bind("telegram:42", "!r:hs");
        f.rooms.bind("feishu:oc_2", "!other:hs");

        assert!(f.dispatcher.on_internal_event("!r:hs", "m.text", &json!({"msgtype": "m.text", "body": "hi"})).await);
        assert_eq!(
            f.feishu.sent().await,
            vec![ChannelSend::Text {
                chat_id: "oc_1".into(),
                text: "hi".into()
            }]
        );
        assert_eq!(f.telegram.sent().await[0].chat_id(), "42");
        assert!(f.ledger.is_empty());
    }

    #[tokio::test]
    async fn text_succeeds_if_any_chat_received_it() {
        let f = fixture();
        f.rooms.bind("feishu:oc_1", "!r:hs");
        f.rooms.bind("telegram:42", "!r:hs");
        f.feishu.fail_next("down").await;
        assert!(f.dispatcher.on_internal_event("!r:hs", "m.notice", &json!({"body": "hi"})).await);

        f.telegram.fail_next("down").await;
        f.feishu.fail_next("down").await;
        assert!(!f.dispatcher.on_internal_event("!r:hs", "m.notice", &json!({"body": "again"})).await);
    }

    #[tokio::test]
    async fn unbound_room_and_empty_text_send_nothing() {
        let f = fixture();
        assert!(!f.dispatcher.on_internal_event("!r:hs", "m.text", &json!({"body": "hi"})).await);
        f.rooms.bind("feishu:oc_1", "!r:hs");
        assert!(!f.dispatcher.on_internal_event("!r:hs", "m.text", &json!({"body": "  "})).await);
        assert!(!f.dispatcher.on_internal_event("!r:hs", "m.image", &json!({"body": "x.png"})).await);
        assert_eq!(f.feishu.sent_count().await, 0);
    }

    #[tokio::test]
    async fn card_is_rendered_as_approval_request_for_bound_chats() {
        let f = fixture();
        f.rooms.bind("telegram:42", "!r:hs");
        let card = approval_card(&ApprovalCardRequest {
            request_id: "cheq-1".into(),
            title: "Deploy".into(),
            ..Default::default()
        });

        assert!(f.dispatcher.on_internal_event("!r:hs", "m.card", &card.to_content()).await);
        let sent = f.telegram.sent().await;
        let ChannelSend::Delivery { semantic_type, payload, .. } = &sent[0] else {
            panic!("expected a delivery");
        };
        assert_eq!(semantic_type, "approval_request");
        assert_eq!(payload["title"], "Deploy");
        assert_eq!(payload["metadata"]["cheq_id"], "cheq-1");
        assert_eq!(f.ledger.len(), 1);
    }

    #[tokio::test]
    async fn handler_skips_own_and_non_message_events() {
        let f = fixture();
        f.rooms.bind("feishu:oc_1", "!r:hs");
        let content = json!({"msgtype": "m.text", "body": "echo"});

        f.dispatcher
            .handle("!r:hs", &BusEvent::message("$1", "@bridge:hs", content.clone()))
            .await
            .unwrap();
        let mut state = BusEvent::message("$2", "@alice:hs", content.clone());
        state.event_type = "m.room.topic".into();
        f.dispatcher.handle("!r:hs", &state).await.unwrap();
        assert_eq!(f.feishu.sent_count().await, 0);

        f.dispatcher
            .handle("!r:hs", &BusEvent::message("$3", "@alice:hs", content))
            .await
            .unwrap();
        assert_eq!(f.feishu.sent_count().await, 1);
    }

    #[tokio::test]
    async fn owner_alert_posted_by_the_bridge_is_delivered() {
        let f = fixture();
        let bus = MockBus::new("@bridge:hs");
        let owners = Arc::new(KvOwnerDirectory::new(Arc::new(MemoryKv::new())));
        owners
            .set_owner_channels(
                "owner-1",
                vec![OwnerChannel {
                    channel: "feishu".into(),
                    receive_id: "ou_1".into(),
                    receive_id_type: "open_id".into(),
                    enabled: true,
                }],
            )
            .await
            .unwrap();
        let alerter = OwnerAlerter::new(bus.clone(), owners, Some("!delivery:hs".into()));
        assert_eq!(
            alerter
                .notify_owner_alert("owner-1", "critical", "Disk full", "", AlertLinks::default())
                .await
                .unwrap(),
            1
        );

        let posted = bus.sent_to("!delivery:hs").await;
        let event = BusEvent::message("$alert", "@bridge:hs", posted[0].content.clone());
        f.dispatcher.handle("!delivery:hs", &event).await.unwrap();

        let sent = f.feishu.sent().await;
        assert_eq!(sent.len(), 1);
        let ChannelSend::Delivery { target, semantic_type, .. } = &sent[0] else {
            panic!("expected a delivery");
        };
        assert_eq!(semantic_type, "alert_notification");
        assert_eq!(target.receive_id, "ou_1");
        assert_eq!(f.ledger.len(), 1);
    }
}
