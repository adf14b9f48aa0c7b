// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feishu channel adapter for the Tianshu bridge hub.
//!
//! Outbound messages go through the Open API ([`FeishuClient`]); inbound
//! chat messages arrive as event callbacks, parsed by [`parse_event`].

pub mod adapter;
pub mod client;
pub mod event;

pub use adapter::{FeishuChannel, PLATFORM};
pub use client::FeishuClient;
pub use event::{FeishuEvent, parse_event};
