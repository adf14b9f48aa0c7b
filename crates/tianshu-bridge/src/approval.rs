// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Correlation between approval notifications and the requests they announce.
//!
//! Two indexes are kept under one lock: the event that carried a notification
//! (for replies) and a per-room queue of open requests (for bare "approve"
//! messages). Entries expire after the TTL; expiry is lazy and every read
//! prunes both indexes first.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tianshu_core::{Clock, SystemClock};
use tracing::debug;

/// Whether an entry created at `created_at` is still valid at `now`.
pub fn is_live(created_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match (now - created_at).to_std() {
        Ok(age) => age <= ttl,
        // Created "in the future": the clock went backwards.
        Err(_) => true,
    }
}

/// A request awaiting a decision, as seen from one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub request_id: String,
    pub gateway_base_url: String,
}

/// A request awaiting a decision, with the room it was announced in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub room_id: String,
    pub request_id: String,
    pub gateway_base_url: String,
}

#[derive(Debug, Clone)]
struct Correlation {
    request_id: String,
    gateway_base_url: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Queued {
    request_id: String,
    gateway_base_url: String,
    created_at: DateTime<Utc>,
}

impl Queued {
    fn pending(&self) -> PendingApproval {
        PendingApproval {
            request_id: self.request_id.clone(),
            gateway_base_url: self.gateway_base_url.clone(),
        }
    }

    fn entry(&self, room_id: &str) -> PendingEntry {
        PendingEntry {
            room_id: room_id.to_string(),
            request_id: self.request_id.clone(),
            gateway_base_url: self.gateway_base_url.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Indexes {
    /// `(room_id, event_id)` of the notification.
    by_event: HashMap<(String, String), Correlation>,
    /// Oldest first.
    queues: HashMap<String, Vec<Queued>>,
}

impl Indexes {
    fn prune(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.by_event.retain(|_, c| is_live(c.created_at, now, ttl));
        self.queues.retain(|_, queue| {
            queue.retain(|q| is_live(q.created_at, now, ttl));
            !queue.is_empty()
        });
    }
}

/// Pending approvals with TTL expiry.
pub struct ApprovalStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    indexes: Mutex<Indexes>,
}

impl ApprovalStore {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            indexes: Mutex::new(Indexes::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Locks and prunes expired entries.
    fn live(&self) -> MutexGuard<'_, Indexes> {
        let mut indexes = self.indexes.lock().unwrap_or_else(|e| e.into_inner());
        indexes.prune(self.clock.now(), self.ttl);
        indexes
    }

    /// Remembers that `event_id` in `room_id` announced `request_id`.
    ///
    /// Returns `false` without recording when any id is empty.
    pub fn record(&self, room_id: &str, event_id: &str, request_id: &str, gateway_base_url: &str) -> bool {
        if room_id.is_empty() || event_id.is_empty() || request_id.is_empty() {
            debug!(room_id, event_id, request_id, "incomplete approval correlation ignored");
            return false;
        }
        let base = gateway_base_url.trim_end_matches('/').to_string();
        let now = self.clock.now();
        let mut indexes = self.live();
        indexes.by_event.insert(
            (room_id.to_string(), event_id.to_string()),
            Correlation {
                request_id: request_id.to_string(),
                gateway_base_url: base.clone(),
                created_at: now,
            },
        );
        indexes.queues.entry(room_id.to_string()).or_default().push(Queued {
            request_id: request_id.to_string(),
            gateway_base_url: base,
            created_at: now,
        });
        true
    }

    /// The request announced by the event a reply points at.
    pub fn lookup_by_reply(&self, room_id: &str, event_id: &str) -> Option<PendingApproval> {
        self.live()
            .by_event
            .get(&(room_id.to_string(), event_id.to_string()))
            .map(|c| PendingApproval {
                request_id: c.request_id.clone(),
                gateway_base_url: c.gateway_base_url.clone(),
            })
    }

    /// The newest open request in the room.
    pub fn last_pending(&self, room_id: &str) -> Option<PendingApproval> {
        self.live()
            .queues
            .get(room_id)
            .and_then(|queue| queue.last())
            .map(Queued::pending)
    }

    /// The newest open request in the room whose id starts with `prefix`.
    pub fn find_pending(&self, room_id: &str, prefix: &str) -> Option<PendingApproval> {
        if prefix.is_empty() {
            return None;
        }
        self.live()
            .queues
            .get(room_id)
            .and_then(|queue| queue.iter().rev().find(|q| q.request_id.starts_with(prefix)))
            .map(Queued::pending)
    }

    /// Open requests in the room, oldest first.
    pub fn all_pending(&self, room_id: &str) -> Vec<PendingApproval> {
        self.live()
            .queues
            .get(room_id)
            .map(|queue| queue.iter().map(Queued::pending).collect())
            .unwrap_or_default()
    }

    /// Open requests across all rooms, oldest first.
    pub fn all_pending_global(&self) -> Vec<PendingEntry> {
        let indexes = self.live();
        let mut all: Vec<(&str, &Queued)> = indexes
            .queues
            .iter()
            .flat_map(|(room, queue)| queue.iter().map(move |q| (room.as_str(), q)))
            .collect();
        all.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then_with(|| a.0.cmp(b.0)));
        all.into_iter().map(|(room, q)| q.entry(room)).collect()
    }

    /// The newest open request across all rooms.
    pub fn last_pending_global(&self) -> Option<PendingEntry> {
        let indexes = self.live();
        let mut newest: Option<(&str, &Queued)> = None;
        for (room, queue) in &indexes.queues {
            if let Some(last) = queue.last() {
                let newer = newest.is_none_or(|(_, best)| last.created_at >= best.created_at);
                if newer {
                    newest = Some((room, last));
                }
            }
        }
        newest.map(|(room, q)| q.entry(room))
    }

    /// Drops the correlation for one notification event.
    pub fn consume(&self, room_id: &str, event_id: &str) -> bool {
        self.live()
            .by_event
            .remove(&(room_id.to_string(), event_id.to_string()))
            .is_some()
    }

    /// Closes a request in a room: queue entries and their event correlations.
    pub fn remove_from_queue(&self, room_id: &str, request_id: &str) -> bool {
        let mut indexes = self.live();
        let mut removed = false;
        if let Some(queue) = indexes.queues.get_mut(room_id) {
            let before = queue.len();
            queue.retain(|q| q.request_id != request_id);
            removed = queue.len() != before;
            if queue.is_empty() {
                indexes.queues.remove(room_id);
            }
        }
        indexes
            .by_event
            .retain(|(room, _), c| !(room == room_id && c.request_id == request_id));
        removed
    }

    /// Live correlations and queued requests.
    pub fn counts(&self) -> (usize, usize) {
        let indexes = self.live();
        let queued = indexes.queues.values().map(Vec::len).sum();
        (indexes.by_event.len(), queued)
    }
}

impl std::fmt::Debug for ApprovalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalStore").field("ttl", &self.ttl).finish()
    }
}
