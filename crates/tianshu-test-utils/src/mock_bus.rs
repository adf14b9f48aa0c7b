// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock internal bus for deterministic testing.
//!
//! Sync batches are scripted with [`MockBus::push_batch`]; an empty script
//! makes `sync` wait for the next pushed batch. Sent events and created rooms
//! are captured for assertion.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use tianshu_core::event::{BusEvent, RoomEvents, SyncBatch, SyncRequest};
use tianshu_core::{EventBus, TianshuError};

/// One event captured by [`MockBus::send_event`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentEvent {
    pub room_id: String,
    pub event_id: String,
    pub content: Value,
}

impl SentEvent {
    pub fn body(&self) -> &str {
        self.content
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

enum Scripted {
    Batch(SyncBatch),
    Error(String),
}

/// A scripted event bus.
pub struct MockBus {
    user_id: String,
    script: Mutex<VecDeque<Scripted>>,
    notify: Notify,
    requests: Mutex<Vec<SyncRequest>>,
    sent: Mutex<Vec<SentEvent>>,
    rooms: Mutex<Vec<String>>,
    fail_sends: Mutex<usize>,
    fail_create: Mutex<bool>,
    counter: AtomicUsize,
}

impl MockBus {
    pub fn new(user_id: &str) -> Arc<Self> {
        Arc::new(Self {
            user_id: user_id.to_string(),
            script: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            requests: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            rooms: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(0),
            fail_create: Mutex::new(false),
            counter: AtomicUsize::new(0),
        })
    }

    /// Queues a batch with the given events for one room.
    pub async fn push_events(&self, room_id: &str, events: Vec<BusEvent>) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.push_batch(SyncBatch {
            next_batch: format!("s{n}"),
            rooms: vec![RoomEvents {
                room_id: room_id.to_string(),
                events,
            }],
        })
        .await;
    }

    pub async fn push_batch(&self, batch: SyncBatch) {
        self.script.lock().await.push_back(Scripted::Batch(batch));
        self.notify.notify_one();
    }

    /// Queues a failed sync.
    pub async fn push_error(&self, message: &str) {
        self.script
            .lock()
            .await
            .push_back(Scripted::Error(message.to_string()));
        self.notify.notify_one();
    }

    /// Makes the next `n` sends fail.
    pub async fn fail_sends(&self, n: usize) {
        *self.fail_sends.lock().await = n;
    }

    pub async fn fail_room_creation(&self, fail: bool) {
        *self.fail_create.lock().await = fail;
    }

    pub async fn sync_requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn sent(&self) -> Vec<SentEvent> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, room_id: &str) -> Vec<SentEvent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|e| e.room_id == room_id)
            .cloned()
            .collect()
    }

    pub async fn created_rooms(&self) -> Vec<String> {
        self.rooms.lock().await.clone()
    }
}

#[async_trait]
impl EventBus for MockBus {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn sync(&self, request: SyncRequest) -> Result<SyncBatch, TianshuError> {
        self.requests.lock().await.push(request);
        loop {
            if let Some(next) = self.script.lock().await.pop_front() {
                return match next {
                    Scripted::Batch(batch) => Ok(batch),
                    Scripted::Error(message) => Err(TianshuError::bus(message)),
                };
            }
            self.notify.notified().await;
        }
    }

    async fn send_event(&self, room_id: &str, content: Value) -> Result<String, TianshuError> {
        {
            let mut failures = self.fail_sends.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(TianshuError::bus("send rejected"));
            }
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let event_id = format!("$mock{n}");
        self.sent.lock().await.push(SentEvent {
            room_id: room_id.to_string(),
            event_id: event_id.clone(),
            content,
        });
        Ok(event_id)
    }

    async fn create_room(&self, name: &str) -> Result<String, TianshuError> {
        if *self.fail_create.lock().await {
            return Err(TianshuError::bus(format!("cannot create room {name}")));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let room_id = format!("!{name}-{n}:mock");
        self.rooms.lock().await.push(room_id.clone());
        Ok(room_id)
    }
}
