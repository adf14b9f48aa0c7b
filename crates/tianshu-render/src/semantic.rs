// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic types and the generic key-extraction fallback.

use serde_json::Value;
use strum::{Display, EnumIter, EnumString};
use tianshu_core::types::truncate_chars;

/// Business meaning of a delivery payload, independent of any platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SemanticType {
    ApprovalRequest,
    ApprovalResult,
    DashboardSummary,
    AgentList,
    AlertNotification,
    RegistrationConfirm,
    AgentStatus,
    Text,
}

/// Keys shown for payloads of unknown semantic types.
pub const DEFAULT_DISPLAY_KEYS: &[&str] = &["text", "title", "body"];

/// Fallback text budget when no display key matched.
pub const FALLBACK_MAX_CHARS: usize = 500;

/// Shown instead of list or map values.
pub const COMPOSITE_PLACEHOLDER: &str = "(see details)";

impl SemanticType {
    /// Parses a wire name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }

    /// Ordered keys the fallback renderer extracts for this type.
    pub fn display_keys(self) -> &'static [&'static str] {
        match self {
            Self::ApprovalRequest => &["title", "description"],
            Self::ApprovalResult => &["request_id", "approved", "comment"],
            Self::DashboardSummary => &["participant_count", "agent_count", "deliver_rate"],
            Self::AgentList => &["items", "total"],
            Self::AlertNotification => &["level", "title", "body"],
            Self::RegistrationConfirm => &["pairing_code", "agent_display_name", "expire_at"],
            Self::AgentStatus => &["status", "agent_id", "message"],
            Self::Text => &["text"],
        }
    }
}

/// Display keys for a wire name, with the default list for unknown names.
pub fn display_keys_for(semantic_type: &str) -> &'static [&'static str] {
    SemanticType::parse(semantic_type)
        .map(SemanticType::display_keys)
        .unwrap_or(DEFAULT_DISPLAY_KEYS)
}

/// Scalar rendering of a payload value. Null and missing give `None`.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(COMPOSITE_PLACEHOLDER.to_string()),
        other => Some(other.to_string()),
    }
}

/// Generic rendering shared by every platform's fallback.
///
/// Produces `key: value` lines for the display keys present in the payload,
/// or the compact JSON of the whole payload cut to [`FALLBACK_MAX_CHARS`].
pub fn fallback_text(semantic_type: &str, payload: &Value) -> String {
    let lines: Vec<String> = display_keys_for(semantic_type)
        .iter()
        .filter_map(|key| {
            payload
                .get(*key)
                .and_then(scalar_text)
                .map(|value| format!("{key}: {value}"))
        })
        .collect();

    if lines.is_empty() {
        truncate_chars(&payload.to_string(), FALLBACK_MAX_CHARS)
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strum::IntoEnumIterator;

    #[test]
    fn every_type_round_trips_its_wire_name() {
        for ty in SemanticType::iter() {
            assert_eq!(SemanticType::parse(&ty.to_string()), Some(ty));
        }
        assert_eq!(SemanticType::parse("weather_report"), None);
    }

    #[test]
    fn unknown_type_extracts_text_key() {
        let text = fallback_text("weather_report", &json!({"text": "hello"}));
        assert!(text.contains("text: hello"));
    }

    #[test]
    fn no_matching_keys_stringifies_payload() {
        assert_eq!(fallback_text("weather_report", &json!({})), "{}");

        let long = "x".repeat(800);
        let text = fallback_text("weather_report", &json!({"other": long}));
        assert_eq!(text.chars().count(), FALLBACK_MAX_CHARS);
        assert!(text.starts_with("{\"other\":\"xxx"));
    }

    #[test]
    fn composite_values_become_placeholders() {
        let text = fallback_text(
            "agent_list",
            &json!({"items": [{"name": "a"}], "total": 1}),
        );
        assert_eq!(text, "items: (see details)\ntotal: 1");
    }

    #[test]
    fn keys_follow_type_order() {
        let text = fallback_text(
            "approval_result",
            &json!({"comment": "fine", "approved": true, "request_id": "r1"}),
        );
        assert_eq!(text, "request_id: r1\napproved: true\ncomment: fine");
    }
}
