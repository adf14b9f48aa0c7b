// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic renderers for the Tianshu bridge hub.
//!
//! A renderer is a pure function from `(semantic_type, payload)` to a
//! platform-native message. Field extraction lives in [`fields`] and is shared
//! by the [`feishu`] and [`telegram`] renderers; [`card`] builds the native
//! interactive cards posted into internal rooms.

pub mod card;
pub mod feishu;
pub mod fields;
pub mod registry;
pub mod semantic;
pub mod telegram;

pub use card::{ApprovalCardRequest, Card, approval_card, card_payload};
pub use feishu::FeishuMessage;
pub use fields::{ActionButton, ButtonStyle};
pub use registry::RendererRegistry;
pub use semantic::{SemanticType, fallback_text};
pub use telegram::{InlineButton, TelegramMessage};
