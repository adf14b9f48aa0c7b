// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field extraction shared by every platform renderer.
//!
//! Each view reads one semantic payload into typed fields. The Feishu and
//! Telegram renderers only lay these views out, so both platforms always show
//! the same information for the same payload.

use serde_json::Value;

use crate::semantic::scalar_text;

/// Visual weight of a button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonStyle {
    Primary,
    Success,
    Danger,
    Secondary,
}

impl ButtonStyle {
    /// Fixed lookup from the payload's style name. Unknown names are secondary.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "primary" => Self::Primary,
            "success" => Self::Success,
            "danger" => Self::Danger,
            _ => Self::Secondary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Success => "success",
            Self::Danger => "danger",
            Self::Secondary => "secondary",
        }
    }
}

/// One action offered with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ActionButton {
    pub fn new(id: &str, label: &str, style: ButtonStyle) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            style,
        }
    }
}

/// Converts an `actions` array of `{id, label, style}` objects, keeping order.
///
/// Entries without an id are dropped; a missing label falls back to the id.
pub fn parse_actions(actions: Option<&Value>) -> Vec<ActionButton> {
    actions
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = non_empty(item.get("id"))?;
                    let label = non_empty(item.get("label")).unwrap_or_else(|| id.clone());
                    let style = item
                        .get("style")
                        .and_then(Value::as_str)
                        .map(ButtonStyle::from_name)
                        .unwrap_or(ButtonStyle::Secondary);
                    Some(ActionButton { id, label, style })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Approve and reject, offered when a request names a callback but no actions.
pub fn default_approval_actions() -> Vec<ActionButton> {
    vec![
        ActionButton::new("approve", "Approve", ButtonStyle::Success),
        ActionButton::new("reject", "Reject", ButtonStyle::Danger),
    ]
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(scalar_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn field(payload: &Value, key: &str) -> Option<String> {
    non_empty(payload.get(key))
}

/// Looks in `metadata` first, then at the top level.
fn meta_field(payload: &Value, key: &str) -> Option<String> {
    non_empty(payload.get("metadata").and_then(|m| m.get(key))).or_else(|| field(payload, key))
}

fn title_or(payload: &Value, default: &str) -> String {
    field(payload, "title").unwrap_or_else(|| default.to_string())
}

/// `approval_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequestView {
    pub title: String,
    pub description: Option<String>,
    pub cheq_id: Option<String>,
    pub risk_level: Option<String>,
    pub agent_did: Option<String>,
    pub operation: Option<String>,
    pub actions: Vec<ActionButton>,
}

impl ApprovalRequestView {
    pub fn from_payload(payload: &Value) -> Self {
        let mut actions = parse_actions(payload.get("actions"));
        if actions.is_empty() && field(payload, "callback_url").is_some() {
            actions = default_approval_actions();
        }
        Self {
            title: title_or(payload, "Approval Request"),
            description: field(payload, "description").or_else(|| field(payload, "content")),
            cheq_id: meta_field(payload, "cheq_id"),
            risk_level: meta_field(payload, "risk_level"),
            agent_did: meta_field(payload, "agent_did"),
            operation: meta_field(payload, "operation"),
            actions,
        }
    }
}

/// Decision carried by an `approval_result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Approved,
    Rejected,
    Pending,
}

impl ResultStatus {
    pub fn emoji(self) -> &'static str {
        match self {
            Self::Approved => "✅",
            Self::Rejected => "❌",
            Self::Pending => "⏳",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Pending => "Pending",
        }
    }
}

/// `approval_result`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalResultView {
    pub title: String,
    pub status: ResultStatus,
    pub content: Option<String>,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
    pub cheq_id: Option<String>,
}

impl ApprovalResultView {
    pub fn from_payload(payload: &Value) -> Self {
        let status = match field(payload, "status").map(|s| s.to_ascii_uppercase()) {
            Some(s) if s == "APPROVED" => ResultStatus::Approved,
            Some(s) if s == "REJECTED" || s == "DENIED" => ResultStatus::Rejected,
            Some(_) => ResultStatus::Pending,
            None => match payload.get("approved").and_then(Value::as_bool) {
                Some(true) => ResultStatus::Approved,
                Some(false) => ResultStatus::Rejected,
                None => ResultStatus::Pending,
            },
        };
        Self {
            title: title_or(payload, "Approval Result"),
            status,
            content: field(payload, "content").or_else(|| field(payload, "comment")),
            approved_by: field(payload, "approved_by"),
            reason: field(payload, "reason"),
            cheq_id: meta_field(payload, "cheq_id").or_else(|| field(payload, "request_id")),
        }
    }
}

/// `dashboard_summary`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub title: String,
    pub participant_count: Option<String>,
    pub agent_count: Option<String>,
    pub deliver_rate: Option<String>,
}

impl DashboardView {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            title: title_or(payload, "Dashboard"),
            participant_count: field(payload, "participant_count"),
            agent_count: field(payload, "agent_count"),
            deliver_rate: field(payload, "deliver_rate"),
        }
    }
}

/// One row of an `agent_list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentListItem {
    pub name: String,
    pub status: Option<String>,
    pub online: bool,
}

impl AgentListItem {
    fn from_value(value: &Value) -> Option<Self> {
        if let Some(name) = value.as_str() {
            return Some(Self {
                name: name.to_string(),
                status: None,
                online: false,
            });
        }
        let name = field(value, "name")
            .or_else(|| field(value, "display_name"))
            .or_else(|| field(value, "agent_id"))?;
        let status = field(value, "status");
        let online = value
            .get("online")
            .and_then(Value::as_bool)
            .unwrap_or_else(|| status.as_deref() == Some("online"));
        Some(Self {
            name,
            status,
            online,
        })
    }
}

/// `agent_list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentListView {
    pub title: String,
    pub items: Vec<AgentListItem>,
    pub total: usize,
}

impl AgentListView {
    pub fn from_payload(payload: &Value) -> Self {
        let items: Vec<AgentListItem> = payload
            .get("items")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(AgentListItem::from_value).collect())
            .unwrap_or_default();
        let total = payload
            .get("total")
            .and_then(Value::as_u64)
            .map(|t| t as usize)
            .unwrap_or(items.len());
        Self {
            title: title_or(payload, "Agents"),
            items,
            total,
        }
    }

    /// Rows beyond the first `limit`.
    pub fn hidden(&self, limit: usize) -> usize {
        self.items.len().saturating_sub(limit)
    }
}

/// Severity of an `alert_notification`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertLevel {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "warning" | "warn" => Self::Warning,
            "error" => Self::Error,
            "critical" | "fatal" => Self::Critical,
            _ => Self::Info,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Info => "ℹ️",
            Self::Warning => "⚠️",
            Self::Error => "🔴",
            Self::Critical => "🚨",
        }
    }
}

/// `alert_notification`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertView {
    pub level: AlertLevel,
    pub title: String,
    pub body: Option<String>,
    pub related: Option<String>,
    pub action_url: Option<String>,
}

impl AlertView {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            level: field(payload, "level")
                .map(|l| AlertLevel::from_name(&l))
                .unwrap_or(AlertLevel::Info),
            title: title_or(payload, "Alert"),
            body: field(payload, "body"),
            related: field(payload, "related_entity_id").or_else(|| field(payload, "related")),
            action_url: field(payload, "action_url"),
        }
    }
}

/// `registration_confirm`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationView {
    pub title: String,
    pub pairing_code: Option<String>,
    pub agent_display_name: Option<String>,
    pub expire_at: Option<String>,
}

impl RegistrationView {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            title: title_or(payload, "Registration Confirmation"),
            pairing_code: field(payload, "pairing_code"),
            agent_display_name: field(payload, "agent_display_name"),
            expire_at: field(payload, "expire_at"),
        }
    }
}

/// `agent_status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatusView {
    pub title: String,
    pub status: String,
    pub agent_id: Option<String>,
    pub message: Option<String>,
}

impl AgentStatusView {
    pub fn from_payload(payload: &Value) -> Self {
        Self {
            title: title_or(payload, "Agent Status"),
            status: field(payload, "status").unwrap_or_else(|| "unknown".to_string()),
            agent_id: field(payload, "agent_id"),
            message: field(payload, "message"),
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self.status.to_ascii_lowercase().as_str() {
            "online" | "active" | "running" => "🟢",
            "offline" | "stopped" => "🔴",
            "idle" | "paused" => "🟡",
            "error" | "failed" => "❌",
            _ => "⚪",
        }
    }
}
