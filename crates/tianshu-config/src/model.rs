// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tianshu bridge hub.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Tianshu configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TianshuConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Internal event bus (Matrix homeserver) connection used by the bridge.
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Reply-to-approve listener.
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Room addressing and relay behavior.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Delivery ledger settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Feishu Open Platform credentials.
    #[serde(default)]
    pub feishu: FeishuConfig,

    /// Telegram bot settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP surface (health, webhooks, ops queries).
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "tianshu".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Matrix homeserver connection for the bridge user.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    /// Base URL of the homeserver client API.
    #[serde(default = "default_homeserver")]
    pub homeserver: String,

    /// Fully qualified user id of the bridge (`@tianshu:example.org`).
    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Long-poll timeout of each `/sync` request, in seconds.
    #[serde(default = "default_sync_timeout_secs")]
    pub sync_timeout_secs: u64,

    /// First retry delay after a failed sync, in seconds.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Upper bound for the doubling retry delay, in seconds.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver: default_homeserver(),
            user_id: None,
            access_token: None,
            sync_timeout_secs: default_sync_timeout_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl MatrixConfig {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.backoff_base_secs)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }
}

fn default_homeserver() -> String {
    "http://localhost:8008".to_string()
}

fn default_sync_timeout_secs() -> u64 {
    30
}

fn default_backoff_base_secs() -> u64 {
    2
}

fn default_backoff_max_secs() -> u64 {
    60
}

/// Reply-to-approve listener configuration.
///
/// The listener syncs under its own Matrix identity, the one approval
/// requests are sent from, so human replies land in its DM rooms.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApprovalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    /// Age after which a pending approval is ignored, in seconds.
    #[serde(default = "default_approval_ttl_secs")]
    pub ttl_secs: u64,

    /// Gateway used when a pending entry carries no base URL of its own.
    #[serde(default = "default_gateway_base_url")]
    pub gateway_base_url: String,

    /// Timeout of each approval-resolution call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_id: None,
            access_token: None,
            ttl_secs: default_approval_ttl_secs(),
            gateway_base_url: default_gateway_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApprovalConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_approval_ttl_secs() -> u64 {
    3600
}

fn default_gateway_base_url() -> String {
    "http://localhost:8090".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Room addressing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Give every external chat its own room instead of the shared room.
    #[serde(default)]
    pub use_private_room: bool,

    /// Room every external chat maps to in shared mode.
    #[serde(default)]
    pub shared_room_id: Option<String>,

    /// Room carrying delivery envelopes (owner alerts are posted here).
    #[serde(default)]
    pub delivery_room_id: Option<String>,

    /// Create a room for an unknown external chat on its first message.
    #[serde(default = "default_true")]
    pub auto_create_rooms: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            use_private_room: false,
            shared_room_id: None,
            delivery_room_id: None,
            auto_create_rooms: true,
        }
    }
}

/// Delivery ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Ledger capacity; the oldest records are evicted beyond it.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Timeout of each outbound platform send, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Number of recent records the ops summary covers.
    #[serde(default = "default_summary_limit")]
    pub summary_limit: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            send_timeout_secs: default_request_timeout_secs(),
            summary_limit: default_summary_limit(),
        }
    }
}

impl DeliveryConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

fn default_max_entries() -> usize {
    5000
}

fn default_summary_limit() -> usize {
    500
}

/// Feishu Open Platform configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeishuConfig {
    #[serde(default)]
    pub app_id: Option<String>,

    #[serde(default)]
    pub app_secret: Option<String>,

    #[serde(default = "default_feishu_base_url")]
    pub base_url: String,
}

impl Default for FeishuConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            app_secret: None,
            base_url: default_feishu_base_url(),
        }
    }
}

fn default_feishu_base_url() -> String {
    "https://open.feishu.cn".to_string()
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Telegram user ids or usernames allowed to talk through the bridge.
    /// Empty allows everyone.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Relay inbound chats via long polling.
    #[serde(default = "default_true")]
    pub poll_inbound: bool,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: Vec::new(),
            poll_inbound: true,
        }
    }
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8080
}
