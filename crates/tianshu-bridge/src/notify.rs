// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Posting approval requests into rooms.

use std::sync::Arc;

use tianshu_core::{EventBus, TianshuError};
use tianshu_render::{ApprovalCardRequest, approval_card};
use tracing::info;

use crate::approval::ApprovalStore;

/// Sends approval cards and remembers which event announced which request.
pub struct ApprovalNotifier {
    bus: Arc<dyn EventBus>,
    store: Arc<ApprovalStore>,
}

impl ApprovalNotifier {
    pub fn new(bus: Arc<dyn EventBus>, store: Arc<ApprovalStore>) -> Self {
        Self { bus, store }
    }

    /// Posts the card and records the correlation. Returns the card's event id.
    pub async fn send_approval_request(
        &self,
        room_id: &str,
        request: &ApprovalCardRequest,
        gateway_base_url: &str,
    ) -> Result<String, TianshuError> {
        let card = approval_card(request);
        let event_id = self.bus.send_event(room_id, card.to_content()).await?;
        self.store
            .record(room_id, &event_id, &request.request_id, gateway_base_url);
        info!(
            room_id,
            event_id = %event_id,
            request_id = %request.request_id,
            "approval request posted"
        );
        Ok(event_id)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tianshu_core::envelope::is_card_event;
    use tianshu_test_utils::MockBus;

    use super::*;

    #[tokio::test]
    async fn card_event_is_correlated_with_the_request() {
        let bus = MockBus::new("@approver:mock");
        let store = Arc::new(ApprovalStore::new(Duration::from_secs(3600)));
        let notifier = ApprovalNotifier::new(bus.clone(), store.clone());

        let request = ApprovalCardRequest {
            request_id: "req-abc".into(),
            title: "Transfer".into(),
            ..Default::default()
        };
        let event_id = notifier
            .send_approval_request("!r:mock", &request, "http://gw/")
            .await
            .unwrap();

        let sent = bus.sent_to("!r:mock").await;
        assert!(is_card_event(&sent[0].content));
        let pending = store.lookup_by_reply("!r:mock", &event_id).unwrap();
        assert_eq!(pending.request_id, "req-abc");
        assert_eq!(pending.gateway_base_url, "http://gw");
    }

    #[tokio::test]
    async fn failed_send_records_nothing() {
        let bus = MockBus::new("@approver:mock");
        bus.fail_sends(1).await;
        let store = Arc::new(ApprovalStore::new(Duration::from_secs(3600)));
        let notifier = ApprovalNotifier::new(bus, store.clone());
        let request = ApprovalCardRequest {
            request_id: "req-abc".into(),
            ..Default::default()
        };
        assert!(notifier.send_approval_request("!r:mock", &request, "http://gw").await.is_err());
        assert!(store.last_pending("!r:mock").is_none());
    }
}
