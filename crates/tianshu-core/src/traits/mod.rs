// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! Channel and bus adapters extend [`PluginAdapter`] or stand alone, and all
//! use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod approval;
pub mod bus;
pub mod channel;
pub mod directory;
pub mod storage;

pub use adapter::PluginAdapter;
pub use approval::ApprovalResolver;
pub use bus::{EventBus, EventHandler};
pub use channel::ChannelAdapter;
pub use directory::OwnerDirectory;
pub use storage::KeyValueStore;
