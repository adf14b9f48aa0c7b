// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lookup into the owner/agent identity registry.

use async_trait::async_trait;

use crate::error::TianshuError;
use crate::types::OwnerChannel;

/// Read access to the notification targets an owner has registered.
#[async_trait]
pub trait OwnerDirectory: Send + Sync + 'static {
    /// All channels of the owner, enabled or not. Unknown owners yield an empty list.
    async fn owner_channels(&self, owner_id: &str) -> Result<Vec<OwnerChannel>, TianshuError>;
}
