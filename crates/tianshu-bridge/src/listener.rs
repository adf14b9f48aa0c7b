// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply-to-approve: turns chat replies into approval decisions.
//!
//! The listener runs under its own bus identity. For every `m.text` message it
//! parses an approval intent, finds the request(s) it refers to, resolves
//! them with the gateway, and posts one confirmation back into the room.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tianshu_core::types::truncate_chars;
use tianshu_core::{ApprovalResolver, BusEvent, EventBus, EventHandler, TianshuError};
use tracing::{debug, info, warn};

use crate::approval::{ApprovalStore, PendingEntry};
use crate::intent::{ApprovalIntent, parse_reply};

/// The only message type approvals are read from. Notices are bot output.
const APPROVAL_MSGTYPE: &str = "m.text";

/// Characters of a request id shown in confirmations.
const SHORT_ID_CHARS: usize = 8;

/// Outcome of one approval message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub approved: bool,
    /// Shortened ids of the requests the gateway accepted.
    pub resolved: Vec<String>,
}

impl ResolutionSummary {
    pub fn confirmation(&self) -> String {
        let (mark, verb) = if self.approved {
            ("✅", "Approved")
        } else {
            ("❌", "Rejected")
        };
        format!(
            "{mark} {verb} {} request(s): {}",
            self.resolved.len(),
            self.resolved.join(", ")
        )
    }
}

/// One request selected for resolution.
struct Target {
    entry: PendingEntry,
    /// Notification event the message replied to.
    reply_to: Option<String>,
}

/// Resolves approvals from chat replies.
pub struct ApprovalListener {
    bus: Arc<dyn EventBus>,
    store: Arc<ApprovalStore>,
    resolver: Arc<dyn ApprovalResolver>,
    default_gateway_base_url: String,
}

impl ApprovalListener {
    pub fn new(
        bus: Arc<dyn EventBus>,
        store: Arc<ApprovalStore>,
        resolver: Arc<dyn ApprovalResolver>,
        default_gateway_base_url: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            store,
            resolver,
            default_gateway_base_url: default_gateway_base_url.into(),
        }
    }

    /// Handles one text message. Returns what was resolved, if anything.
    pub async fn process(&self, room_id: &str, event: &BusEvent) -> Option<ResolutionSummary> {
        let reply = parse_reply(event.body());
        let approved = reply.intent.decision()?;

        let targets = if reply.intent == ApprovalIntent::ApproveAll {
            self.store
                .all_pending_global()
                .into_iter()
                .map(|entry| Target { entry, reply_to: None })
                .collect()
        } else {
            match self.select(room_id, event, reply.request_ref.as_deref()) {
                Some(target) => vec![target],
                None => Vec::new(),
            }
        };
        if targets.is_empty() {
            debug!(room_id, event_id = %event.event_id, "no pending approval for reply");
            return None;
        }

        let mut resolved = Vec::new();
        for target in targets {
            if let Some(short) = self.resolve_one(&target, approved).await {
                resolved.push(short);
            }
        }
        if resolved.is_empty() {
            return None;
        }

        let summary = ResolutionSummary { approved, resolved };
        let content = json!({"msgtype": "m.notice", "body": summary.confirmation()});
        if let Err(e) = self.bus.send_event(room_id, content).await {
            warn!(room_id, error = %e, "approval confirmation not posted");
        }
        Some(summary)
    }

    /// Reply-to correlation, then an explicit id, then the room's newest request.
    ///
    /// A reply to some other message never falls back to the newest request.
    fn select(&self, room_id: &str, event: &BusEvent, request_ref: Option<&str>) -> Option<Target> {
        let entry = |request_id: String, gateway_base_url: String| PendingEntry {
            room_id: room_id.to_string(),
            request_id,
            gateway_base_url,
        };
        let by_ref = || request_ref.and_then(|prefix| self.store.find_pending(room_id, prefix));
        let found = match event.in_reply_to() {
            Some(reply_to) => {
                if let Some(found) = self.store.lookup_by_reply(room_id, reply_to) {
                    return Some(Target {
                        entry: entry(found.request_id, found.gateway_base_url),
                        reply_to: Some(reply_to.to_string()),
                    });
                }
                debug!(room_id, reply_to, "reply does not point at a pending approval");
                by_ref()
            }
            None => by_ref().or_else(|| self.store.last_pending(room_id)),
        };
        found.map(|found| Target {
            entry: entry(found.request_id, found.gateway_base_url),
            reply_to: None,
        })
    }

    async fn resolve_one(&self, target: &Target, approved: bool) -> Option<String> {
        let entry = &target.entry;
        let base_url = if entry.gateway_base_url.is_empty() {
            self.default_gateway_base_url.as_str()
        } else {
            entry.gateway_base_url.as_str()
        };
        match self.resolver.resolve(base_url, &entry.request_id, approved).await {
            Ok(()) => {
                self.store.remove_from_queue(&entry.room_id, &entry.request_id);
                if let Some(reply_to) = &target.reply_to {
                    self.store.consume(&entry.room_id, reply_to);
                }
                info!(room_id = %entry.room_id, request_id = %entry.request_id, approved, "approval resolved");
                Some(format!("{}...", truncate_chars(&entry.request_id, SHORT_ID_CHARS)))
            }
            Err(e) => {
                warn!(request_id = %entry.request_id, error = %e, "approval resolution failed");
                None
            }
        }
    }
}

#[async_trait]
impl EventHandler for ApprovalListener {
    async fn handle(&self, room_id: &str, event: &BusEvent) -> Result<(), TianshuError> {
        if !event.is_room_message() || event.sender == self.bus.user_id() {
            return Ok(());
        }
        if event.msgtype() != APPROVAL_MSGTYPE {
            return Ok(());
        }
        self.process(room_id, event).await;
        Ok(())
    }
}
