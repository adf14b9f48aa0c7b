// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock approval gateway.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tianshu_core::{ApprovalResolver, TianshuError};

/// One resolution call seen by [`MockResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub gateway_base_url: String,
    pub request_id: String,
    pub approved: bool,
}

/// Records resolutions; requests marked with [`fail_for`](Self::fail_for) are refused.
#[derive(Default)]
pub struct MockResolver {
    calls: Mutex<Vec<Resolution>>,
    failing: Mutex<HashSet<String>>,
}

impl MockResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail_for(&self, request_id: &str) {
        self.failing.lock().await.insert(request_id.to_string());
    }

    /// Every call, including refused ones.
    pub async fn calls(&self) -> Vec<Resolution> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl ApprovalResolver for MockResolver {
    async fn resolve(
        &self,
        gateway_base_url: &str,
        request_id: &str,
        approved: bool,
    ) -> Result<(), TianshuError> {
        self.calls.lock().await.push(Resolution {
            gateway_base_url: gateway_base_url.to_string(),
            request_id: request_id.to_string(),
            approved,
        });
        if self.failing.lock().await.contains(request_id) {
            return Err(TianshuError::Approval {
                message: format!("gateway refused {request_id}"),
                source: None,
            });
        }
        Ok(())
    }
}
