// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic key-value storage consumed for identity data.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TianshuError;

/// Bucketed JSON key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>, TianshuError>;

    async fn set(&self, bucket: &str, key: &str, value: Value) -> Result<(), TianshuError>;

    /// Returns `true` if the key existed.
    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, TianshuError>;

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, TianshuError>;
}
