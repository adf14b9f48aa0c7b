// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only, size-capped log of delivery attempts.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tianshu_core::types::truncate_chars;
use tianshu_core::{Clock, DeliveryStatus, DeliveryTarget, SystemClock};
use tracing::debug;

/// Longest payload summary kept per record, in characters.
pub const PAYLOAD_SUMMARY_MAX_CHARS: usize = 200;

/// One outbound delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub delivery_id: String,
    pub semantic_type: String,
    pub target: DeliveryTarget,
    pub payload_summary: String,
    pub status: DeliveryStatus,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub platform_message_id: Option<String>,
    pub error_reason: Option<String>,
}

/// Conjunctive filters for [`DeliveryLog::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeliveryQuery {
    pub delivery_id: Option<String>,
    /// Inclusive lower bound on `started_at`.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `started_at`.
    pub end: Option<DateTime<Utc>>,
    pub receive_id: Option<String>,
    pub status: Option<DeliveryStatus>,
}

impl DeliveryQuery {
    fn matches(&self, record: &DeliveryRecord) -> bool {
        self.delivery_id
            .as_deref()
            .is_none_or(|id| record.delivery_id == id)
            && self.start.is_none_or(|start| record.started_at >= start)
            && self.end.is_none_or(|end| record.started_at <= end)
            && self
                .receive_id
                .as_deref()
                .is_none_or(|rid| record.target.receive_id == rid)
            && self.status.is_none_or(|status| record.status == status)
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryPage {
    /// At most `limit` records, most recently updated first.
    pub items: Vec<DeliveryRecord>,
    /// Number of records matching the filters, before the limit.
    pub total: usize,
}

/// Storage of delivery records.
///
/// Misses are reported through the return value (`None`, `false`, empty
/// page); no operation fails.
pub trait DeliveryLog: Send + Sync + 'static {
    /// Records a new pending delivery and returns its fresh id.
    fn start(&self, semantic_type: &str, target: &DeliveryTarget, payload_summary: &str) -> String {
        self.start_with_id(None, semantic_type, target, payload_summary)
    }

    /// Like [`start`](Self::start), but keeps a caller-chosen id when one is given.
    fn start_with_id(
        &self,
        delivery_id: Option<&str>,
        semantic_type: &str,
        target: &DeliveryTarget,
        payload_summary: &str,
    ) -> String;

    /// Moves the most recent record with this id to a terminal status.
    ///
    /// Only the optional fields that are given overwrite the record. Returns
    /// `false` when no record has this id or `status` is `pending`.
    fn complete(
        &self,
        delivery_id: &str,
        status: DeliveryStatus,
        platform_message_id: Option<&str>,
        error_reason: Option<&str>,
    ) -> bool;

    fn query(&self, query: &DeliveryQuery, limit: usize) -> DeliveryPage;

    /// The most recent record with this id.
    fn get_by_id(&self, delivery_id: &str) -> Option<DeliveryRecord>;

    /// The latest `limit` records by insertion, newest first.
    fn recent(&self, limit: usize) -> Vec<DeliveryRecord>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory ledger evicting the oldest record beyond its capacity.
pub struct InMemoryLedger {
    entries: Mutex<VecDeque<DeliveryRecord>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    pub fn new(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn entries(&self) -> MutexGuard<'_, VecDeque<DeliveryRecord>> {
        // Records stay well-formed even if a holder panicked mid-operation.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DeliveryLog for InMemoryLedger {
    fn start_with_id(
        &self,
        delivery_id: Option<&str>,
        semantic_type: &str,
        target: &DeliveryTarget,
        payload_summary: &str,
    ) -> String {
        let delivery_id = delivery_id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = self.clock.now();
        let record = DeliveryRecord {
            delivery_id: delivery_id.clone(),
            semantic_type: semantic_type.to_string(),
            target: target.clone(),
            payload_summary: truncate_chars(payload_summary, PAYLOAD_SUMMARY_MAX_CHARS),
            status: DeliveryStatus::Pending,
            started_at: now,
            updated_at: now,
            platform_message_id: None,
            error_reason: None,
        };

        let mut entries = self.entries();
        entries.push_back(record);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        delivery_id
    }

    fn complete(
        &self,
        delivery_id: &str,
        status: DeliveryStatus,
        platform_message_id: Option<&str>,
        error_reason: Option<&str>,
    ) -> bool {
        if !status.is_terminal() {
            debug!(delivery_id, "refusing to reopen delivery as pending");
            return false;
        }
        let now = self.clock.now();
        let mut entries = self.entries();
        let Some(record) = entries.iter_mut().rev().find(|r| r.delivery_id == delivery_id) else {
            debug!(delivery_id, "delivery not found in ledger");
            return false;
        };
        record.status = status;
        record.updated_at = now;
        if let Some(id) = platform_message_id {
            record.platform_message_id = Some(id.to_string());
        }
        if let Some(reason) = error_reason {
            record.error_reason = Some(reason.to_string());
        }
        true
    }

    fn query(&self, query: &DeliveryQuery, limit: usize) -> DeliveryPage {
        let entries = self.entries();
        let matches: Vec<&DeliveryRecord> = entries.iter().rev().filter(|r| query.matches(r)).collect();
        let total = matches.len();
        let mut items: Vec<DeliveryRecord> = matches.into_iter().take(limit).cloned().collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        DeliveryPage { items, total }
    }

    fn get_by_id(&self, delivery_id: &str) -> Option<DeliveryRecord> {
        self.entries()
            .iter()
            .rev()
            .find(|r| r.delivery_id == delivery_id)
            .cloned()
    }

    fn recent(&self, limit: usize) -> Vec<DeliveryRecord> {
        self.entries().iter().rev().take(limit).cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries().len()
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedger")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use proptest::prelude::*;
    use tianshu_core::ManualClock;

    use super::*;

    fn target(receive_id: &str) -> DeliveryTarget {
        DeliveryTarget::new("feishu", receive_id)
    }

    fn ledger_with_clock(capacity: usize) -> (InMemoryLedger, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (InMemoryLedger::with_clock(capacity, clock.clone()), clock)
    }

    #[test]
    fn start_records_pending_delivery() {
        let ledger = InMemoryLedger::new(10);
        let id = ledger.start("approval_request", &target("oc_1"), "Deploy");
        let record = ledger.get_by_id(&id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Pending);
        assert_eq!(record.semantic_type, "approval_request");
        assert_eq!(record.started_at, record.updated_at);
        assert!(record.platform_message_id.is_none());
    }

    #[test]
    fn start_keeps_caller_id_and_truncates_summary() {
        let ledger = InMemoryLedger::new(10);
        let id = ledger.start_with_id(Some("d-1"), "text", &target("oc_1"), &"s".repeat(300));
        assert_eq!(id, "d-1");
        let record = ledger.get_by_id("d-1").unwrap();
        assert_eq!(record.payload_summary.chars().count(), PAYLOAD_SUMMARY_MAX_CHARS);

        let generated = ledger.start_with_id(Some(""), "text", &target("oc_1"), "");
        assert!(!generated.is_empty());
    }

    #[test]
    fn complete_updates_only_given_fields() {
        let (ledger, clock) = ledger_with_clock(10);
        let id = ledger.start("text", &target("oc_1"), "hi");
        clock.advance(Duration::from_secs(5));

        assert!(ledger.complete(&id, DeliveryStatus::Delivered, Some("om_1"), None));
        let record = ledger.get_by_id(&id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Delivered);
        assert_eq!(record.platform_message_id.as_deref(), Some("om_1"));
        assert!(record.error_reason.is_none());
        assert_eq!((record.updated_at - record.started_at).num_seconds(), 5);
    }

    #[test]
    fn complete_with_unknown_id_is_a_miss() {
        let ledger = InMemoryLedger::new(10);
        let id = ledger.start("text", &target("oc_1"), "hi");
        assert!(ledger.complete(&id, DeliveryStatus::Delivered, Some("om_1"), None));
        assert!(!ledger.complete("some-other-id", DeliveryStatus::Failed, None, Some("boom")));

        assert_eq!(ledger.len(), 1);
        let record = ledger.get_by_id(&id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Delivered);
        assert!(record.error_reason.is_none());
    }

    #[test]
    fn complete_twice_last_write_wins() {
        let ledger = InMemoryLedger::new(10);
        let id = ledger.start("text", &target("oc_1"), "hi");
        assert!(ledger.complete(&id, DeliveryStatus::Failed, None, Some("timeout")));
        assert!(ledger.complete(&id, DeliveryStatus::Delivered, Some("om_2"), None));
        let record = ledger.get_by_id(&id).unwrap();
        assert_eq!(record.status, DeliveryStatus::Delivered);
        assert_eq!(record.error_reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn completed_delivery_cannot_be_reopened() {
        let ledger = InMemoryLedger::new(10);
        let id = ledger.start("text", &target("oc_1"), "hi");
        assert!(ledger.complete(&id, DeliveryStatus::Delivered, None, None));
        assert!(!ledger.complete(&id, DeliveryStatus::Pending, None, None));
        assert_eq!(ledger.get_by_id(&id).unwrap().status, DeliveryStatus::Delivered);
    }

    #[test]
    fn duplicate_ids_resolve_to_most_recent() {
        let ledger = InMemoryLedger::new(10);
        ledger.start_with_id(Some("dup"), "text", &target("old"), "");
        ledger.start_with_id(Some("dup"), "text", &target("new"), "");
        assert_eq!(ledger.get_by_id("dup").unwrap().target.receive_id, "new");
        assert!(ledger.complete("dup", DeliveryStatus::Delivered, None, None));
        let page = ledger.query(&DeliveryQuery::default(), 10);
        assert_eq!(page.items[0].status, DeliveryStatus::Delivered);
        assert_eq!(page.items[0].target.receive_id, "new");
        assert_eq!(page.items[1].status, DeliveryStatus::Pending);
    }

    #[test]
    fn cap_evicts_oldest_first() {
        let ledger = InMemoryLedger::new(5000);
        let first = ledger.start("text", &target("oc_1"), "first");
        for i in 0..5000 {
            ledger.start("text", &target("oc_1"), &format!("msg {i}"));
        }
        assert_eq!(ledger.len(), 5000);
        assert!(ledger.get_by_id(&first).is_none());
    }

    #[test]
    fn query_filters_conjunctively() {
        let (ledger, clock) = ledger_with_clock(100);
        let a = ledger.start("text", &target("oc_a"), "");
        clock.advance(Duration::from_secs(10));
        let b = ledger.start("text", &target("oc_b"), "");
        clock.advance(Duration::from_secs(10));
        let c = ledger.start("text", &target("oc_a"), "");
        ledger.complete(&a, DeliveryStatus::Delivered, None, None);
        ledger.complete(&c, DeliveryStatus::Failed, None, Some("x"));

        let by_receiver = ledger.query(
            &DeliveryQuery {
                receive_id: Some("oc_a".into()),
                ..Default::default()
            },
            10,
        );
        assert_eq!(by_receiver.total, 2);

        let failed_a = ledger.query(
            &DeliveryQuery {
                receive_id: Some("oc_a".into()),
                status: Some(DeliveryStatus::Failed),
                ..Default::default()
            },
            10,
        );
        assert_eq!(failed_a.total, 1);
        assert_eq!(failed_a.items[0].delivery_id, c);

        let b_started = ledger.get_by_id(&b).unwrap().started_at;
        let window = ledger.query(
            &DeliveryQuery {
                start: Some(b_started),
                end: Some(b_started),
                ..Default::default()
            },
            10,
        );
        assert_eq!(window.total, 1);
        assert_eq!(window.items[0].delivery_id, b);

        let by_id = ledger.query(
            &DeliveryQuery {
                delivery_id: Some(a.clone()),
                ..Default::default()
            },
            10,
        );
        assert_eq!(by_id.items.len(), 1);
    }

    #[test]
    fn query_total_counts_matches_before_limit() {
        let ledger = InMemoryLedger::new(100);
        for _ in 0..7 {
            ledger.start("text", &target("oc_1"), "");
        }
        let page = ledger.query(&DeliveryQuery::default(), 3);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total, 7);
    }

    #[test]
    fn query_orders_by_last_update() {
        let (ledger, clock) = ledger_with_clock(100);
        let older = ledger.start("text", &target("oc_1"), "");
        clock.advance(Duration::from_secs(1));
        let newer = ledger.start("text", &target("oc_1"), "");
        clock.advance(Duration::from_secs(1));
        ledger.complete(&older, DeliveryStatus::Delivered, None, None);

        let page = ledger.query(&DeliveryQuery::default(), 10);
        let ids: Vec<&str> = page.items.iter().map(|r| r.delivery_id.as_str()).collect();
        assert_eq!(ids, vec![older.as_str(), newer.as_str()]);
    }

    #[test]
    fn query_limit_keeps_most_recent_inserts() {
        let ledger = InMemoryLedger::new(100);
        let ids: Vec<String> = (0..5).map(|_| ledger.start("text", &target("oc_1"), "")).collect();
        let page = ledger.query(&DeliveryQuery::default(), 2);
        let got: Vec<&String> = page.items.iter().map(|r| &r.delivery_id).collect();
        assert!(got.contains(&&ids[4]));
        assert!(got.contains(&&ids[3]));
    }

    #[test]
    fn record_serializes_status_in_snake_case() {
        let ledger = InMemoryLedger::new(10);
        let id = ledger.start("text", &target("oc_1"), "");
        ledger.complete(&id, DeliveryStatus::NoReply, None, None);
        let json = serde_json::to_value(ledger.get_by_id(&id).unwrap()).unwrap();
        assert_eq!(json["status"], "no_reply");
        assert_eq!(json["target"]["channel"], "feishu");
    }

    proptest! {
        #[test]
        fn ledger_never_exceeds_capacity(capacity in 1usize..50, inserts in 0usize..200) {
            let ledger = InMemoryLedger::new(capacity);
            let mut ids = Vec::new();
            for _ in 0..inserts {
                ids.push(ledger.start("text", &target("oc_1"), ""));
            }
            prop_assert_eq!(ledger.len(), inserts.min(capacity));
            for (i, id) in ids.iter().enumerate() {
                let retained = i + capacity >= inserts;
                prop_assert_eq!(ledger.get_by_id(id).is_some(), retained);
            }
        }
    }
}
