// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tianshu bridge hub.

use thiserror::Error;

/// The primary error type used across all Tianshu adapter traits and core operations.
#[derive(Debug, Error)]
pub enum TianshuError {
    /// Configuration errors (invalid TOML, missing credentials, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (key-value access, serialization of stored values).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// External channel errors (platform API failure, non-2xx, malformed response).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal event bus errors (sync failure, send rejected by homeserver).
    #[error("event bus error: {message}")]
    Bus {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Approval resolution call failed.
    #[error("approval error: {message}")]
    Approval {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The adapter was started without the credentials it needs.
    #[error("adapter `{adapter}` is not configured")]
    NotConfigured { adapter: String },

    /// Requested adapter was not found in the registry.
    #[error("adapter not found: {adapter_type}/{name}")]
    AdapterNotFound { adapter_type: String, name: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TianshuError {
    /// Shorthand for a [`TianshuError::Channel`] without a source error.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`TianshuError::Bus`] without a source error.
    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus {
            message: message.into(),
            source: None,
        }
    }

    /// Short machine-friendly reason, recorded as the ledger `error_reason`.
    pub fn reason(&self) -> String {
        match self {
            Self::NotConfigured { .. } => "not_configured".to_string(),
            Self::Timeout { .. } => "timeout".to_string(),
            other => other.to_string(),
        }
    }
}
