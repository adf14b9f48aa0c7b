// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram rendering: MarkdownV2 text plus an inline keyboard.
//!
//! Every message is built once as a list of styled spans and then printed
//! twice, as MarkdownV2 and as plain text. The plain form is what gets sent
//! when Telegram rejects the markup.

use serde::Serialize;
use serde_json::Value;

use crate::fields::{
    ActionButton, AgentListView, AgentStatusView, AlertView, ApprovalRequestView,
    ApprovalResultView, ButtonStyle, DashboardView, RegistrationView,
};
use crate::registry::RendererRegistry;
use crate::semantic::{SemanticType, fallback_text};

/// Rows shown in an agent list message.
pub const AGENT_LIST_LIMIT: usize = 15;

/// One inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
    #[serde(skip)]
    pub style: ButtonStyle,
}

/// A message for the Telegram Bot API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelegramMessage {
    /// MarkdownV2 body.
    pub text: String,
    /// Same content without markup.
    pub plain: String,
    /// Inline keyboard rows.
    pub buttons: Vec<Vec<InlineButton>>,
}

/// Characters MarkdownV2 requires to be escaped outside of entities.
const MARKDOWN_V2_SPECIAL: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Escapes text for use in a MarkdownV2 message.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for c in text.chars() {
        if MARKDOWN_V2_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Clone)]
enum Span {
    Text(String),
    Bold(String),
    Link { label: String, url: String },
}

/// Lines of spans, printable as MarkdownV2 or plain text.
#[derive(Debug, Default)]
struct Doc {
    lines: Vec<Vec<Span>>,
}

impl Doc {
    fn line(&mut self, spans: Vec<Span>) -> &mut Self {
        self.lines.push(spans);
        self
    }

    fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.line(vec![Span::Text(text.into())])
    }

    fn heading(&mut self, emoji: &str, title: &str) -> &mut Self {
        self.line(vec![Span::Text(format!("{emoji} ")), Span::Bold(title.to_string())])
    }

    fn field(&mut self, label: &str, value: Option<&String>) -> &mut Self {
        if let Some(value) = value {
            self.line(vec![Span::Bold(format!("{label}:")), Span::Text(format!(" {value}"))]);
        }
        self
    }

    fn optional(&mut self, text: Option<&String>) -> &mut Self {
        if let Some(text) = text {
            self.text(text.clone());
        }
        self
    }

    fn markdown(&self) -> String {
        self.print(|span| match span {
            Span::Text(t) => escape_markdown_v2(t),
            Span::Bold(t) => format!("*{}*", escape_markdown_v2(t)),
            Span::Link { label, url } => {
                let url = url.replace('\\', "\\\\").replace(')', "\\)");
                format!("[{}]({url})", escape_markdown_v2(label))
            }
        })
    }

    fn plain(&self) -> String {
        self.print(|span| match span {
            Span::Text(t) | Span::Bold(t) => t.clone(),
            Span::Link { label, url } => format!("{label}: {url}"),
        })
    }

    fn print(&self, render: impl Fn(&Span) -> String) -> String {
        self.lines
            .iter()
            .map(|spans| spans.iter().map(&render).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn finish(&self, buttons: Vec<Vec<InlineButton>>) -> TelegramMessage {
        TelegramMessage {
            text: self.markdown(),
            plain: self.plain(),
            buttons,
        }
    }
}

/// One button per row, in action order. Callback data is `<action>:<cheq_id>`.
pub fn keyboard(actions: &[ActionButton], cheq_id: Option<&str>) -> Vec<Vec<InlineButton>> {
    actions
        .iter()
        .map(|action| {
            let callback_data = match cheq_id {
                Some(id) => format!("{}:{id}", action.id),
                None => action.id.clone(),
            };
            vec![InlineButton {
                text: action.label.clone(),
                callback_data,
                style: action.style,
            }]
        })
        .collect()
}

pub fn render_approval_request(payload: &Value) -> TelegramMessage {
    let view = ApprovalRequestView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading("📝", &view.title)
        .optional(view.description.as_ref())
        .field("Operation", view.operation.as_ref())
        .field("Risk level", view.risk_level.as_ref())
        .field("Agent", view.agent_did.as_ref())
        .field("Request ID", view.cheq_id.as_ref());
    doc.finish(keyboard(&view.actions, view.cheq_id.as_deref()))
}

pub fn render_approval_result(payload: &Value) -> TelegramMessage {
    let view = ApprovalResultView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading(view.status.emoji(), &view.title)
        .field("Status", Some(&view.status.label().to_string()))
        .optional(view.content.as_ref())
        .field("By", view.approved_by.as_ref())
        .field("Reason", view.reason.as_ref())
        .field("Request ID", view.cheq_id.as_ref());
    doc.finish(Vec::new())
}

pub fn render_dashboard(payload: &Value) -> TelegramMessage {
    let view = DashboardView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading("📊", &view.title)
        .field("Participants", view.participant_count.as_ref())
        .field("Agents", view.agent_count.as_ref())
        .field("Delivery rate", view.deliver_rate.as_ref());
    doc.finish(Vec::new())
}

pub fn render_agent_list(payload: &Value) -> TelegramMessage {
    let view = AgentListView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading("🤖", &view.title);
    for item in view.items.iter().take(AGENT_LIST_LIMIT) {
        let dot = if item.online { "🟢" } else { "🔴" };
        match &item.status {
            Some(status) => doc.text(format!("{dot} {} ({status})", item.name)),
            None => doc.text(format!("{dot} {}", item.name)),
        };
    }
    let hidden = view.hidden(AGENT_LIST_LIMIT);
    if hidden > 0 {
        doc.text(format!("… {hidden} more"));
    }
    doc.field("Total", Some(&view.total.to_string()));
    doc.finish(Vec::new())
}

pub fn render_alert(payload: &Value) -> TelegramMessage {
    let view = AlertView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading(view.level.emoji(), &view.title)
        .field("Level", Some(&view.level.as_str().to_string()))
        .optional(view.body.as_ref())
        .field("Related", view.related.as_ref());
    if let Some(url) = &view.action_url {
        doc.line(vec![Span::Link {
            label: "Open".to_string(),
            url: url.clone(),
        }]);
    }
    doc.finish(Vec::new())
}

pub fn render_registration(payload: &Value) -> TelegramMessage {
    let view = RegistrationView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading("🔗", &view.title)
        .field("Agent", view.agent_display_name.as_ref())
        .field("Pairing code", view.pairing_code.as_ref())
        .field("Expires at", view.expire_at.as_ref());
    doc.finish(Vec::new())
}

pub fn render_agent_status(payload: &Value) -> TelegramMessage {
    let view = AgentStatusView::from_payload(payload);
    let mut doc = Doc::default();
    doc.heading(view.emoji(), &view.title)
        .field("Status", Some(&view.status))
        .field("Agent", view.agent_id.as_ref())
        .optional(view.message.as_ref());
    doc.finish(Vec::new())
}

pub fn render_fallback(semantic_type: &str, payload: &Value) -> TelegramMessage {
    let mut doc = Doc::default();
    doc.text(fallback_text(semantic_type, payload));
    doc.finish(Vec::new())
}

/// All Telegram renderers. `text` deliberately uses the fallback.
pub fn registry() -> RendererRegistry<TelegramMessage> {
    RendererRegistry::new(render_fallback)
        .register(SemanticType::ApprovalRequest, render_approval_request)
        .register(SemanticType::ApprovalResult, render_approval_result)
        .register(SemanticType::DashboardSummary, render_dashboard)
        .register(SemanticType::AgentList, render_agent_list)
        .register(SemanticType::AlertNotification, render_alert)
        .register(SemanticType::RegistrationConfirm, render_registration)
        .register(SemanticType::AgentStatus, render_agent_status)
}
