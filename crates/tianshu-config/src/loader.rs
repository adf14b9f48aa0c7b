// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tianshu.toml` > `~/.config/tianshu/tianshu.toml` > `/etc/tianshu/tianshu.toml`
//! with environment variable overrides via `TIANSHU_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TianshuConfig;

/// Config sections that env var names are split on.
const SECTIONS: &[&str] = &[
    "service", "matrix", "approval", "bridge", "delivery", "feishu", "telegram", "gateway",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tianshu/tianshu.toml`
/// 3. `~/.config/tianshu/tianshu.toml`
/// 4. `./tianshu.toml`
/// 5. `TIANSHU_*` environment variables
pub fn load_config() -> Result<TianshuConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TianshuConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TianshuConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TianshuConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TianshuConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TianshuConfig::default()))
        .merge(Toml::file("/etc/tianshu/tianshu.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tianshu/tianshu.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tianshu.toml"))
        .merge(env_provider())
}

/// Maps `TIANSHU_FEISHU_APP_ID` to `feishu.app_id`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores themselves stay intact.
fn env_provider() -> Env {
    Env::prefixed("TIANSHU_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
