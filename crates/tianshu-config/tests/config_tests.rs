// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Tianshu configuration system.

use tianshu_config::diagnostic::ConfigError;
use tianshu_config::model::TianshuConfig;
use tianshu_config::{load_and_validate_str, load_config_from_str};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[service]
name = "hub"
log_level = "debug"

[matrix]
homeserver = "https://matrix.example.org"
user_id = "@tianshu:example.org"
access_token = "syt_bridge"
sync_timeout_secs = 20
backoff_base_secs = 1
backoff_max_secs = 30

[approval]
user_id = "@diting:example.org"
access_token = "syt_listener"
ttl_secs = 600
gateway_base_url = "https://gw.example.org"

[bridge]
use_private_room = true
delivery_room_id = "!delivery:example.org"

[delivery]
max_entries = 100

[feishu]
app_id = "cli_a"
app_secret = "s3cret"

[telegram]
bot_token = "123:ABC"
allowed_users = ["alice"]

[gateway]
host = "0.0.0.0"
port = 9000
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "hub");
    assert_eq!(config.matrix.sync_timeout().as_secs(), 20);
    assert_eq!(config.matrix.backoff_max().as_secs(), 30);
    assert_eq!(config.approval.ttl().as_secs(), 600);
    assert_eq!(config.approval.user_id.as_deref(), Some("@diting:example.org"));
    assert!(config.bridge.use_private_room);
    assert_eq!(
        config.bridge.delivery_room_id.as_deref(),
        Some("!delivery:example.org")
    );
    assert_eq!(config.delivery.max_entries, 100);
    assert_eq!(config.feishu.base_url, "https://open.feishu.cn");
    assert_eq!(config.telegram.allowed_users, vec!["alice"]);
    assert_eq!(config.gateway.port, 9000);
}

#[test]
fn defaults_match_reference_behavior() {
    let config = TianshuConfig::default();
    assert_eq!(config.approval.ttl_secs, 3600);
    assert_eq!(config.delivery.max_entries, 5000);
    assert_eq!(config.matrix.sync_timeout_secs, 30);
    assert_eq!(config.matrix.backoff_base_secs, 2);
    assert_eq!(config.matrix.backoff_max_secs, 60);
    assert_eq!(config.delivery.send_timeout_secs, 10);
    assert_eq!(config.approval.request_timeout_secs, 10);
    assert_eq!(config.gateway.port, 8080);
    assert!(!config.bridge.use_private_room);
    assert!(config.bridge.auto_create_rooms);
}

#[test]
fn empty_config_is_valid() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.service.name, "tianshu");
}

#[test]
fn unknown_key_suggests_correction() {
    let toml = r#"
[bridge]
shared_rom_id = "!room:hs"
"#;
    let errors = load_and_validate_str(toml).expect_err("typo must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "shared_rom_id");
            assert_eq!(suggestion.as_deref(), Some("shared_room_id"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[slack]\ntoken = \"x\"\n").expect_err("unknown section");
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors =
        load_and_validate_str("[delivery]\nmax_entries = \"lots\"\n").expect_err("bad type");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn validation_collects_every_error() {
    let toml = r#"
[matrix]
homeserver = "matrix.example.org"
backoff_base_secs = 90
backoff_max_secs = 60

[approval]
ttl_secs = 0

[delivery]
max_entries = 0

[bridge]
shared_room_id = "room-without-bang"

[feishu]
app_id = "cli_only"
"#;
    let errors = load_and_validate_str(toml).expect_err("invalid values");
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(messages.len(), 6, "{messages:#?}");
    assert!(messages.iter().any(|m| m.contains("matrix.homeserver")));
    assert!(messages.iter().any(|m| m.contains("backoff_base_secs (90)")));
    assert!(messages.iter().any(|m| m.contains("approval.ttl_secs")));
    assert!(messages.iter().any(|m| m.contains("delivery.max_entries")));
    assert!(messages.iter().any(|m| m.contains("bridge.shared_room_id")));
    assert!(messages.iter().any(|m| m.contains("feishu.app_id")));
}

#[test]
fn parse_without_validation_accepts_zero_ttl() {
    let config = load_config_from_str("[approval]\nttl_secs = 0\n").expect("parses");
    assert_eq!(config.approval.ttl_secs, 0);
}
