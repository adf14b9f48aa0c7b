// SPDX-FileCopyrightText: 2026 Tianshu Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Approval intent detection in free chat text.

use std::sync::LazyLock;

use regex::Regex;

/// What a chat message asks the approval gateway to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalIntent {
    Approve,
    ApproveAll,
    Reject,
    None,
}

impl ApprovalIntent {
    /// The decision sent to the gateway, if this is an approval intent at all.
    pub fn decision(self) -> Option<bool> {
        match self {
            Self::Approve | Self::ApproveAll => Some(true),
            Self::Reject => Some(false),
            Self::None => None,
        }
    }
}

/// Exact phrases, matched against the lowercased, trimmed message.
pub const VOCABULARY: &[(&str, ApprovalIntent)] = &[
    ("批准", ApprovalIntent::Approve),
    ("approve", ApprovalIntent::Approve),
    ("ok", ApprovalIntent::Approve),
    ("y", ApprovalIntent::Approve),
    ("yes", ApprovalIntent::Approve),
    ("批准所有", ApprovalIntent::ApproveAll),
    ("批准全部", ApprovalIntent::ApproveAll),
    ("approve all", ApprovalIntent::ApproveAll),
    ("yes all", ApprovalIntent::ApproveAll),
    ("拒绝", ApprovalIntent::Reject),
    ("reject", ApprovalIntent::Reject),
    ("deny", ApprovalIntent::Reject),
    ("n", ApprovalIntent::Reject),
    ("no", ApprovalIntent::Reject),
];

/// `<approve word> <request id>`.
static EXPLICIT_APPROVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(批准|approve|ok|y|yes)\s+([0-9a-f-]+)").unwrap());

/// An intent plus the request id the message named, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub intent: ApprovalIntent,
    pub request_ref: Option<String>,
}

pub fn parse_reply(text: &str) -> ParsedReply {
    let normalized = text.trim().to_lowercase();
    if let Some((_, intent)) = VOCABULARY.iter().find(|(phrase, _)| *phrase == normalized) {
        return ParsedReply {
            intent: *intent,
            request_ref: None,
        };
    }
    match EXPLICIT_APPROVAL.captures(&normalized) {
        Some(caps) => ParsedReply {
            intent: ApprovalIntent::Approve,
            request_ref: caps.get(2).map(|m| m.as_str().to_string()),
        },
        None => ParsedReply {
            intent: ApprovalIntent::None,
            request_ref: None,
        },
    }
}

pub fn parse_intent(text: &str) -> ApprovalIntent {
    parse_reply(text).intent
}
