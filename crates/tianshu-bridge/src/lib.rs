// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing core of the Tianshu bridge hub.
//!
//! - [`rooms`] maps external chats to internal rooms.
//! - [`approval`] correlates approval notifications with pending requests.
//! - [`dispatch`] routes internal events to the channel adapters.
//! - [`relay`] forwards external chat messages into rooms.
//! - [`listener`] turns chat replies into approval decisions.
//!
//! All state is held by constructor-injected stores behind `Arc`; nothing
//! here is global.

pub mod alert;
pub mod approval;
pub mod directory;
pub mod dispatch;
pub mod intent;
pub mod listener;
pub mod notify;
pub mod relay;
pub mod resolver;
pub mod rooms;

pub use alert::{AlertLinks, OwnerAlerter};
pub use approval::{ApprovalStore, PendingApproval, PendingEntry, is_live};
pub use directory::{KvOwnerDirectory, MemoryKv};
pub use dispatch::Dispatcher;
pub use intent::{ApprovalIntent, ParsedReply, parse_intent, parse_reply};
pub use listener::{ApprovalListener, ResolutionSummary};
pub use notify::ApprovalNotifier;
pub use relay::InboundRelay;
pub use resolver::HttpApprovalResolver;
pub use rooms::{AddressingMode, RoomRegistry};
