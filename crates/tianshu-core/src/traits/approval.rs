// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval-resolution API consumed by the reply listener.

use async_trait::async_trait;

use crate::error::TianshuError;

/// Resolves a pending approval request at the gateway that issued it.
///
/// Downstream handling is expected to be idempotent by request id.
#[async_trait]
pub trait ApprovalResolver: Send + Sync + 'static {
    async fn resolve(
        &self,
        gateway_base_url: &str,
        request_id: &str,
        approved: bool,
    ) -> Result<(), TianshuError>;
}
