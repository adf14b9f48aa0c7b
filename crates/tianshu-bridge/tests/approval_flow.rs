// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end flows across relay, dispatcher, notifier, and listener.

use std::sync::Arc;
use std::time::Duration;

use tianshu_bridge::{
    AddressingMode, ApprovalListener, ApprovalNotifier, ApprovalStore, Dispatcher, InboundRelay,
    RoomRegistry,
};
use tianshu_core::{BusEvent, EventHandler, InboundMessage};
use tianshu_delivery::{DeliveryLog, InMemoryLedger};
use tianshu_render::ApprovalCardRequest;
use tianshu_test_utils::{ChannelSend, MockBus, MockChannel, MockResolver};

const BRIDGE: &str = "@bridge:hs";
const APPROVER: &str = "@approver:hs";

struct Hub {
    bridge_bus: Arc<MockBus>,
    approver_bus: Arc<MockBus>,
    rooms: Arc<RoomRegistry>,
    store: Arc<ApprovalStore>,
    ledger: Arc<InMemoryLedger>,
    feishu: Arc<MockChannel>,
    resolver: Arc<MockResolver>,
    relay: InboundRelay,
    dispatcher: Dispatcher,
    notifier: ApprovalNotifier,
    listener: ApprovalListener,
}

fn hub(mode: AddressingMode) -> Hub {
    let bridge_bus = MockBus::new(BRIDGE);
    let approver_bus = MockBus::new(APPROVER);
    let rooms = Arc::new(RoomRegistry::new(mode));
    let store = Arc::new(ApprovalStore::new(Duration::from_secs(3600)));
    let ledger = Arc::new(InMemoryLedger::new(100));
    let feishu = Arc::new(MockChannel::new("feishu"));
    let resolver = Arc::new(MockResolver::new());
    Hub {
        relay: InboundRelay::new(bridge_bus.clone(), rooms.clone(), true),
        dispatcher: Dispatcher::new(ledger.clone(), rooms.clone(), BRIDGE).with_adapter(feishu.clone()),
        notifier: ApprovalNotifier::new(approver_bus.clone(), store.clone()),
        listener: ApprovalListener::new(approver_bus.clone(), store.clone(), resolver.clone(), "http://gw"),
        bridge_bus,
        approver_bus,
        rooms,
        store,
        ledger,
        feishu,
        resolver,
    }
}

fn feishu_text(chat_id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        channel: "feishu".into(),
        chat_id: chat_id.into(),
        sender_id: "ou_alice".into(),
        message_id: None,
        text: text.into(),
    }
}

/// Feeds an event sent on `bus` to both sync handlers, as the homeserver would.
async fn observe(hub: &Hub, room_id: &str, event_id: &str, sender: &str, content: serde_json::Value) {
    let event = BusEvent::message(event_id, sender, content);
    hub.dispatcher.handle(room_id, &event).await.unwrap();
    hub.listener.handle(room_id, &event).await.unwrap();
}

#[tokio::test]
async fn approval_round_trip_through_an_external_chat() {
    let hub = hub(AddressingMode::Private);

    // The chat says hello, which creates and binds its room.
    hub.relay.relay(&feishu_text("oc_team", "hello")).await.unwrap();
    let room = hub.rooms.resolve("feishu:oc_team").unwrap();

    // The gateway asks for approval; the card lands in the room.
    let request = ApprovalCardRequest {
        request_id: "5e1f0c2a-7d4b".into(),
        title: "Rotate keys".into(),
        ..Default::default()
    };
    let card_event = hub
        .notifier
        .send_approval_request(&room, &request, "http://gw/")
        .await
        .unwrap();
    let card = hub.approver_bus.sent_to(&room).await[0].content.clone();
    observe(&hub, &room, &card_event, APPROVER, card).await;

    // The dispatcher rendered the card for the bound Feishu chat.
    let sent = hub.feishu.sent().await;
    assert!(matches!(
        &sent[0],
        ChannelSend::Delivery { semantic_type, target, .. }
            if semantic_type == "approval_request" && target.receive_id == "oc_team"
    ));
    assert_eq!(hub.ledger.len(), 1);

    // The human answers in Feishu; the relay posts it as the bridge user.
    let answer_event = hub.relay.relay(&feishu_text("oc_team", "Approve")).await.unwrap();
    let answer = hub.bridge_bus.sent_to(&room).await.last().unwrap().content.clone();
    observe(&hub, &room, &answer_event, BRIDGE, answer).await;

    let calls = hub.resolver.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].request_id, "5e1f0c2a-7d4b");
    assert_eq!(calls[0].gateway_base_url, "http://gw");
    assert!(calls[0].approved);
    assert!(hub.store.all_pending_global().is_empty());

    // The confirmation is posted by the approver and relayed back to Feishu.
    let confirmation = hub.approver_bus.sent_to(&room).await.last().unwrap().clone();
    assert_eq!(confirmation.body(), "✅ Approved 1 request(s): 5e1f0c2a...");
    observe(&hub, &room, &confirmation.event_id, APPROVER, confirmation.content.clone()).await;
    assert!(matches!(
        hub.feishu.sent().await.last(),
        Some(ChannelSend::Text { text, .. }) if text.starts_with("✅ Approved")
    ));
    assert_eq!(hub.resolver.calls().await.len(), 1);
}

#[tokio::test]
async fn shared_room_collects_every_chat() {
    let hub = hub(AddressingMode::Shared("!shared:hs".into()));
    hub.relay.relay(&feishu_text("oc_a", "one")).await.unwrap();
    hub.relay.relay(&feishu_text("oc_b", "two")).await.unwrap();

    observe(
        &hub,
        "!shared:hs",
        "$notice",
        "@ops:hs",
        serde_json::json!({"msgtype": "m.notice", "body": "maintenance at 22:00"}),
    )
    .await;
    let chats: Vec<String> = hub.feishu.sent().await.iter().map(|s| s.chat_id().to_string()).collect();
    assert_eq!(chats, vec!["oc_a", "oc_b"]);
}
