// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::TianshuConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &TianshuConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let homeserver = config.matrix.homeserver.trim();
    if !(homeserver.starts_with("http://") || homeserver.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "matrix.homeserver must be an http(s) URL, got `{homeserver}`"
        )));
    }

    if config.matrix.sync_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "matrix.sync_timeout_secs must be greater than 0",
        ));
    }

    if config.matrix.backoff_base_secs == 0 {
        errors.push(ConfigError::validation(
            "matrix.backoff_base_secs must be greater than 0",
        ));
    }

    if config.matrix.backoff_base_secs > config.matrix.backoff_max_secs {
        errors.push(ConfigError::validation(format!(
            "matrix.backoff_base_secs ({}) must not exceed matrix.backoff_max_secs ({})",
            config.matrix.backoff_base_secs, config.matrix.backoff_max_secs
        )));
    }

    if config.approval.ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "approval.ttl_secs must be greater than 0",
        ));
    }

    if config.approval.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "approval.request_timeout_secs must be greater than 0",
        ));
    }

    if config.delivery.max_entries == 0 {
        errors.push(ConfigError::validation(
            "delivery.max_entries must be greater than 0",
        ));
    }

    if config.delivery.send_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "delivery.send_timeout_secs must be greater than 0",
        ));
    }

    for (key, room) in [
        ("bridge.shared_room_id", &config.bridge.shared_room_id),
        ("bridge.delivery_room_id", &config.bridge.delivery_room_id),
    ] {
        if let Some(room) = room {
            if !room.starts_with('!') {
                errors.push(ConfigError::validation(format!(
                    "{key} must be a room id starting with `!`, got `{room}`"
                )));
            }
        }
    }

    let has_id = config.feishu.app_id.as_deref().is_some_and(|s| !s.is_empty());
    let has_secret = config
        .feishu
        .app_secret
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    if has_id != has_secret {
        errors.push(ConfigError::validation(
            "feishu.app_id and feishu.app_secret must be set together",
        ));
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
