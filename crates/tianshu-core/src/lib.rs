// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tianshu bridge hub.
//!
//! This crate provides the trait definitions, error type, and event envelopes
//! shared by the renderers, stores, platform adapters, and the dispatcher.

pub mod clock;
pub mod envelope;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use envelope::{DeliveryEnvelope, InternalEvent};
pub use error::TianshuError;
pub use event::{BusEvent, RoomEvents, SyncBatch, SyncRequest};
pub use types::{
    AdapterType, ChatAddress, DeliveryStatus, DeliveryTarget, HealthStatus, InboundMessage,
    MessageId, OwnerChannel,
};

pub use traits::{
    ApprovalResolver, ChannelAdapter, EventBus, EventHandler, KeyValueStore, OwnerDirectory,
    PluginAdapter,
};
