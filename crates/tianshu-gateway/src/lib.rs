// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Tianshu bridge hub.
//!
//! Serves the health probe, the Feishu event webhook, approval intake, and
//! the ops endpoints for the delivery ledger and the owner directory.

pub mod handlers;
pub mod server;

pub use server::{ApprovalRoute, GatewayState, ServerConfig, router, start_server};
