// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Feishu rendering: interactive cards with a colored header and `lark_md` body.

use serde::Serialize;
use serde_json::{Value, json};

use crate::fields::{
    ActionButton, AgentListView, AgentStatusView, AlertLevel, AlertView, ApprovalRequestView,
    ApprovalResultView, ButtonStyle, DashboardView, RegistrationView, ResultStatus,
};
use crate::registry::RendererRegistry;
use crate::semantic::{SemanticType, fallback_text};

/// Rows shown in an agent list card.
pub const AGENT_LIST_LIMIT: usize = 20;

/// A message body for the Feishu send API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeishuMessage {
    /// `text` or `interactive`.
    pub msg_type: String,
    pub content: Value,
}

impl FeishuMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            msg_type: "text".to_string(),
            content: json!({ "text": text.into() }),
        }
    }

    pub fn is_card(&self) -> bool {
        self.msg_type == "interactive"
    }
}

/// Header colors accepted by Feishu card templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Template {
    Blue,
    Green,
    Orange,
    Red,
    Grey,
}

impl Template {
    fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Grey => "grey",
        }
    }
}

fn card(template: Template, title: &str, elements: Vec<Value>) -> FeishuMessage {
    FeishuMessage {
        msg_type: "interactive".to_string(),
        content: json!({
            "config": {"wide_screen_mode": true},
            "header": {
                "template": template.as_str(),
                "title": {"tag": "plain_text", "content": title},
            },
            "elements": elements,
        }),
    }
}

fn markdown(text: &str) -> Value {
    json!({"tag": "div", "text": {"tag": "lark_md", "content": text}})
}

/// Joins the non-empty lines into one markdown block.
fn body(lines: Vec<Option<String>>) -> Vec<Value> {
    let text: Vec<String> = lines.into_iter().flatten().collect();
    if text.is_empty() {
        Vec::new()
    } else {
        vec![markdown(&text.join("\n"))]
    }
}

fn labeled(label: &str, value: Option<&String>) -> Option<String> {
    value.map(|v| format!("**{label}:** {v}"))
}

fn button_type(style: ButtonStyle) -> &'static str {
    match style {
        ButtonStyle::Primary | ButtonStyle::Success => "primary",
        ButtonStyle::Danger => "danger",
        ButtonStyle::Secondary => "default",
    }
}

/// An `action` element, buttons in payload order.
pub fn action_element(actions: &[ActionButton], cheq_id: Option<&str>) -> Value {
    let buttons: Vec<Value> = actions
        .iter()
        .map(|action| {
            json!({
                "tag": "button",
                "text": {"tag": "plain_text", "content": action.label},
                "type": button_type(action.style),
                "value": {"action": action.id, "cheq_id": cheq_id},
            })
        })
        .collect();
    json!({"tag": "action", "actions": buttons})
}

pub fn render_approval_request(payload: &Value) -> FeishuMessage {
    let view = ApprovalRequestView::from_payload(payload);
    let mut elements = body(vec![
        view.description.clone(),
        labeled("Operation", view.operation.as_ref()),
        labeled("Risk level", view.risk_level.as_ref()),
        labeled("Agent", view.agent_did.as_ref()),
        labeled("Request ID", view.cheq_id.as_ref()),
    ]);
    if !view.actions.is_empty() {
        elements.push(action_element(&view.actions, view.cheq_id.as_deref()));
    }
    card(Template::Orange, &view.title, elements)
}

pub fn render_approval_result(payload: &Value) -> FeishuMessage {
    let view = ApprovalResultView::from_payload(payload);
    let template = match view.status {
        ResultStatus::Approved => Template::Green,
        ResultStatus::Rejected => Template::Red,
        ResultStatus::Pending => Template::Grey,
    };
    let elements = body(vec![
        Some(format!("{} **{}**", view.status.emoji(), view.status.label())),
        view.content.clone(),
        labeled("By", view.approved_by.as_ref()),
        labeled("Reason", view.reason.as_ref()),
        labeled("Request ID", view.cheq_id.as_ref()),
    ]);
    card(template, &view.title, elements)
}

pub fn render_dashboard(payload: &Value) -> FeishuMessage {
    let view = DashboardView::from_payload(payload);
    let elements = body(vec![
        labeled("Participants", view.participant_count.as_ref()),
        labeled("Agents", view.agent_count.as_ref()),
        labeled("Delivery rate", view.deliver_rate.as_ref()),
    ]);
    card(Template::Blue, &view.title, elements)
}

pub fn render_agent_list(payload: &Value) -> FeishuMessage {
    let view = AgentListView::from_payload(payload);
    let mut lines: Vec<Option<String>> = view
        .items
        .iter()
        .take(AGENT_LIST_LIMIT)
        .map(|item| {
            let dot = if item.online { "🟢" } else { "⚪" };
            Some(match &item.status {
                Some(status) => format!("{dot} {} ({status})", item.name),
                None => format!("{dot} {}", item.name),
            })
        })
        .collect();
    let hidden = view.hidden(AGENT_LIST_LIMIT);
    if hidden > 0 {
        lines.push(Some(format!("… {hidden} more")));
    }
    lines.push(Some(format!("**Total:** {}", view.total)));
    card(Template::Green, &view.title, body(lines))
}

pub fn render_alert(payload: &Value) -> FeishuMessage {
    let view = AlertView::from_payload(payload);
    let template = match view.level {
        AlertLevel::Error | AlertLevel::Critical => Template::Red,
        AlertLevel::Warning => Template::Orange,
        AlertLevel::Info => Template::Blue,
    };
    let elements = body(vec![
        Some(format!("**Level:** {}", view.level.as_str())),
        view.body.clone(),
        labeled("Related", view.related.as_ref()),
        view.action_url.as_ref().map(|url| format!("[Open]({url})")),
    ]);
    card(template, &format!("{} {}", view.level.emoji(), view.title), elements)
}

pub fn render_registration(payload: &Value) -> FeishuMessage {
    let view = RegistrationView::from_payload(payload);
    let elements = body(vec![
        labeled("Agent", view.agent_display_name.as_ref()),
        labeled("Pairing code", view.pairing_code.as_ref()),
        labeled("Expires at", view.expire_at.as_ref()),
    ]);
    card(Template::Green, &view.title, elements)
}

pub fn render_agent_status(payload: &Value) -> FeishuMessage {
    let view = AgentStatusView::from_payload(payload);
    let elements = body(vec![
        Some(format!("{} **{}**", view.emoji(), view.status)),
        labeled("Agent", view.agent_id.as_ref()),
        view.message.clone(),
    ]);
    card(Template::Blue, &view.title, elements)
}

/// Plain text message built from the type's display keys.
pub fn render_fallback(semantic_type: &str, payload: &Value) -> FeishuMessage {
    FeishuMessage::text(fallback_text(semantic_type, payload))
}

/// All Feishu renderers. `text` deliberately uses the fallback.
pub fn registry() -> RendererRegistry<FeishuMessage> {
    RendererRegistry::new(render_fallback)
        .register(SemanticType::ApprovalRequest, render_approval_request)
        .register(SemanticType::ApprovalResult, render_approval_result)
        .register(SemanticType::DashboardSummary, render_dashboard)
        .register(SemanticType::AgentList, render_agent_list)
        .register(SemanticType::AlertNotification, render_alert)
        .register(SemanticType::RegistrationConfirm, render_registration)
        .register(SemanticType::AgentStatus, render_agent_status)
}
