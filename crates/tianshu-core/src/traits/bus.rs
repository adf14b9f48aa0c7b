// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal event bus access and per-event handlers.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TianshuError;
use crate::event::{BusEvent, SyncBatch, SyncRequest};

/// A connection to the internal event bus under one user identity.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Fully qualified id of the user this connection acts as.
    fn user_id(&self) -> &str;

    /// Long-polls for new events.
    async fn sync(&self, request: SyncRequest) -> Result<SyncBatch, TianshuError>;

    /// Sends an `m.room.message` event, returning its event id.
    async fn send_event(&self, room_id: &str, content: Value) -> Result<String, TianshuError>;

    /// Creates a room and returns its id.
    async fn create_room(&self, name: &str) -> Result<String, TianshuError>;
}

/// Receives every event observed by a sync loop, one at a time, in feed order.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, room_id: &str, event: &BusEvent) -> Result<(), TianshuError>;
}
