// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the approval gateway's resolution endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tianshu_core::{ApprovalResolver, TianshuError};
use tracing::debug;

/// Path of the resolution endpoint under the gateway base URL.
const RESOLVE_PATH: &str = "/cheq/approve";

/// Resolves approvals with `POST {base}/cheq/approve?id=..&approved=..`.
#[derive(Debug, Clone)]
pub struct HttpApprovalResolver {
    client: reqwest::Client,
}

impl HttpApprovalResolver {
    pub fn new(timeout: Duration) -> Result<Self, TianshuError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TianshuError::Approval {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }
}

fn resolve_url(gateway_base_url: &str, request_id: &str, approved: bool) -> Result<Url, TianshuError> {
    let raw = format!("{}{RESOLVE_PATH}", gateway_base_url.trim_end_matches('/'));
    let mut url = Url::parse(&raw).map_err(|e| TianshuError::Approval {
        message: format!("invalid gateway base URL `{gateway_base_url}`: {e}"),
        source: Some(Box::new(e)),
    })?;
    url.query_pairs_mut()
        .append_pair("id", request_id)
        .append_pair("approved", if approved { "true" } else { "false" });
    Ok(url)
}

#[async_trait]
impl ApprovalResolver for HttpApprovalResolver {
    async fn resolve(
        &self,
        gateway_base_url: &str,
        request_id: &str,
        approved: bool,
    ) -> Result<(), TianshuError> {
        let url = resolve_url(gateway_base_url, request_id, approved)?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(|e| TianshuError::Approval {
                message: format!("resolution request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, request_id, approved, "approval resolution answered");
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(TianshuError::Approval {
            message: format!("gateway returned {status}: {body}"),
            source: None,
        })
    }
}
