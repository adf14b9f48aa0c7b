// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Tianshu integration tests.
//!
//! Provides mock adapters for fast, deterministic tests without a homeserver,
//! platform APIs, or an approval gateway.
//!
//! # Components
//!
//! - [`MockBus`] - Internal bus with scripted sync batches and captured sends
//! - [`MockChannel`] - External platform with captured deliveries and failure injection
//! - [`MockResolver`] - Approval gateway recording every resolution call

pub mod mock_bus;
pub mod mock_channel;
pub mod mock_resolver;

pub use mock_bus::{MockBus, SentEvent};
pub use mock_channel::{ChannelSend, MockChannel};
pub use mock_resolver::{MockResolver, Resolution};
