// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Native interactive cards posted into internal rooms (MSC1767 style).
//!
//! Clients that understand the card format show buttons; others fall back to
//! `body` / `formatted_body`. The machine-readable fields (`title`, `content`,
//! `actions`, `metadata`) let the dispatcher re-render the card for external
//! platforms.

use serde_json::{Value, json};
use tianshu_core::envelope::{CARD_FORMAT, CARD_MSGTYPE};

use crate::fields::{ActionButton, ButtonStyle, parse_actions};

/// An interactive card before it is turned into event content.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub card_id: String,
    pub title: String,
    pub content: String,
    pub actions: Vec<ActionButton>,
    pub metadata: Value,
}

impl Card {
    /// A card with a fresh id and no actions.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            card_id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            actions: Vec::new(),
            metadata: json!({}),
        }
    }

    pub fn with_action(mut self, action: ActionButton) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    fn cheq_id(&self) -> Option<&str> {
        self.metadata.get("cheq_id").and_then(Value::as_str)
    }

    fn button_href(&self, action: &ActionButton) -> String {
        match self.cheq_id() {
            Some(cheq) => format!("button://action={}&cheq_id={cheq}", action.id),
            None => format!("button://action={}", action.id),
        }
    }

    /// Event content for an `m.room.message`.
    pub fn to_content(&self) -> Value {
        let mut body = vec![self.title.clone()];
        if !self.content.is_empty() {
            body.push(self.content.clone());
        }
        if !self.actions.is_empty() {
            let labels: Vec<String> = self.actions.iter().map(|a| format!("[{}]", a.label)).collect();
            body.push(labels.join(" "));
        }

        let mut html = format!("<h4>{}</h4>", html_escape(&self.title));
        if !self.content.is_empty() {
            html.push_str(&format!("<p>{}</p>", html_escape(&self.content).replace('\n', "<br/>")));
        }
        for action in &self.actions {
            html.push_str(&format!(
                "<a href=\"{}\" data-style=\"{}\">{}</a> ",
                html_escape(&self.button_href(action)),
                action.style.as_str(),
                html_escape(&action.label),
            ));
        }

        let actions: Vec<Value> = self
            .actions
            .iter()
            .map(|a| json!({"id": a.id, "label": a.label, "style": a.style.as_str()}))
            .collect();

        json!({
            "msgtype": CARD_MSGTYPE,
            "format": CARD_FORMAT,
            "body": body.join("\n"),
            "formatted_body": html.trim_end(),
            "card_id": self.card_id,
            "title": self.title,
            "content": self.content,
            "actions": actions,
            "metadata": self.metadata,
        })
    }
}

/// Details shown on an approval card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalCardRequest {
    pub request_id: String,
    pub title: String,
    pub description: String,
    pub agent_did: Option<String>,
    pub operation: Option<String>,
    pub risk_level: Option<String>,
    pub expires_at: Option<String>,
}

/// Approval card with approve / reject buttons bound to the request id.
pub fn approval_card(request: &ApprovalCardRequest) -> Card {
    let mut lines = Vec::new();
    if !request.description.is_empty() {
        lines.push(request.description.clone());
    }
    let details = [
        ("Operation", &request.operation),
        ("Risk level", &request.risk_level),
        ("Agent", &request.agent_did),
        ("Expires at", &request.expires_at),
    ];
    for (label, value) in details {
        if let Some(value) = value {
            lines.push(format!("{label}: {value}"));
        }
    }
    lines.push("Reply \"approve\" or \"reject\" to this message.".to_string());

    let title = if request.title.is_empty() {
        "Approval Request".to_string()
    } else {
        request.title.clone()
    };

    Card::new(title, lines.join("\n"))
        .with_action(ActionButton::new("approve", "Approve", ButtonStyle::Success))
        .with_action(ActionButton::new("reject", "Reject", ButtonStyle::Danger))
        .with_metadata(json!({
            "cheq_id": request.request_id,
            "agent_did": request.agent_did,
            "operation": request.operation,
            "risk_level": request.risk_level,
            "expires_at": request.expires_at,
        }))
}

/// Re-reads card content as an `approval_request` payload for external renderers.
pub fn card_payload(content: &Value) -> Value {
    let title = content
        .get("title")
        .and_then(Value::as_str)
        .or_else(|| content.get("body").and_then(Value::as_str).and_then(|b| b.lines().next()))
        .unwrap_or_default();
    let actions: Vec<Value> = parse_actions(content.get("actions"))
        .into_iter()
        .map(|a| json!({"id": a.id, "label": a.label, "style": a.style.as_str()}))
        .collect();
    json!({
        "title": title,
        "description": content.get("content").cloned().unwrap_or(Value::Null),
        "metadata": content.get("metadata").cloned().unwrap_or_else(|| json!({})),
        "actions": actions,
        "card_id": content.get("card_id").cloned().unwrap_or(Value::Null),
    })
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::ApprovalRequestView;
    use tianshu_core::envelope::is_card_event;

    fn request() -> ApprovalCardRequest {
        ApprovalCardRequest {
            request_id: "cheq-42".into(),
            title: "Transfer funds".into(),
            description: "Move <100> credits".into(),
            agent_did: Some("did:agent:7".into()),
            operation: Some("transfer".into()),
            risk_level: Some("high".into()),
            expires_at: None,
        }
    }

    #[test]
    fn approval_card_is_a_card_event() {
        let content = approval_card(&request()).to_content();
        assert!(is_card_event(&content));
        assert_eq!(content["metadata"]["cheq_id"], "cheq-42");
        assert_eq!(content["actions"][0]["style"], "success");
        assert_eq!(content["actions"][1]["style"], "danger");
    }

    #[test]
    fn formatted_body_escapes_html_and_links_buttons() {
        let content = approval_card(&request()).to_content();
        let html = content["formatted_body"].as_str().unwrap();
        assert!(html.contains("Move &lt;100&gt; credits"));
        assert!(html.contains("button://action=approve&amp;cheq_id=cheq-42"));
        let body = content["body"].as_str().unwrap();
        assert!(body.starts_with("Transfer funds\n"));
        assert!(body.ends_with("[Approve] [Reject]"));
    }

    #[test]
    fn card_payload_feeds_the_approval_renderer() {
        let content = approval_card(&request()).to_content();
        let view = ApprovalRequestView::from_payload(&card_payload(&content));
        assert_eq!(view.title, "Transfer funds");
        assert_eq!(view.cheq_id.as_deref(), Some("cheq-42"));
        assert_eq!(view.risk_level.as_deref(), Some("high"));
        assert_eq!(view.actions.len(), 2);
        assert_eq!(view.actions[0].style, ButtonStyle::Success);
    }

    #[test]
    fn card_ids_are_unique() {
        assert_ne!(Card::new("a", "").card_id, Card::new("a", "").card_id);
    }
}
