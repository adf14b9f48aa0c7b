// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Owner notification channels kept in a key-value store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tianshu_core::{KeyValueStore, OwnerChannel, OwnerDirectory, TianshuError};
use tokio::sync::RwLock;

/// Bucket holding one record per owner.
pub const OWNERS_BUCKET: &str = "owners";

/// In-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryKv {
    buckets: RwLock<HashMap<String, HashMap<String, Value>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Value>, TianshuError> {
        Ok(self
            .buckets
            .read()
            .await
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned())
    }

    async fn set(&self, bucket: &str, key: &str, value: Value) -> Result<(), TianshuError> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, TianshuError> {
        Ok(self
            .buckets
            .write()
            .await
            .get_mut(bucket)
            .and_then(|b| b.remove(key))
            .is_some())
    }

    async fn list_keys(&self, bucket: &str) -> Result<Vec<String>, TianshuError> {
        let mut keys: Vec<String> = self
            .buckets
            .read()
            .await
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

/// Stored shape of an owner record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerRecord {
    #[serde(default)]
    pub channels: Vec<OwnerChannel>,
}

/// [`OwnerDirectory`] backed by the `owners` bucket.
pub struct KvOwnerDirectory {
    store: Arc<dyn KeyValueStore>,
}

impl KvOwnerDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn set_owner_channels(
        &self,
        owner_id: &str,
        channels: Vec<OwnerChannel>,
    ) -> Result<(), TianshuError> {
        let value = serde_json::to_value(OwnerRecord { channels })
            .map_err(|e| TianshuError::Storage { source: Box::new(e) })?;
        self.store.set(OWNERS_BUCKET, owner_id, value).await
    }

    pub async fn remove_owner(&self, owner_id: &str) -> Result<bool, TianshuError> {
        self.store.delete(OWNERS_BUCKET, owner_id).await
    }

    pub async fn owner_ids(&self) -> Result<Vec<String>, TianshuError> {
        self.store.list_keys(OWNERS_BUCKET).await
    }
}

#[async_trait]
impl OwnerDirectory for KvOwnerDirectory {
    async fn owner_channels(&self, owner_id: &str) -> Result<Vec<OwnerChannel>, TianshuError> {
        let Some(value) = self.store.get(OWNERS_BUCKET, owner_id).await? else {
            return Ok(Vec::new());
        };
        let record: OwnerRecord =
            serde_json::from_value(value).map_err(|e| TianshuError::Storage { source: Box::new(e) })?;
        Ok(record.channels)
    }
}
