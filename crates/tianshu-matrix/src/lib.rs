// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Matrix bus adapter for the Tianshu bridge hub.
//!
//! [`MatrixClient`] speaks the client-server API (v3) over reqwest and
//! implements [`EventBus`](tianshu_core::EventBus). [`SyncLoop`] long-polls
//! any bus and feeds each event to an
//! [`EventHandler`](tianshu_core::EventHandler) in feed order.

pub mod client;
pub mod sync;

pub use client::MatrixClient;
pub use sync::{Backoff, SyncHandle, SyncLoop, SyncSettings, SyncState};
