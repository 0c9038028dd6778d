//! Conversation continuity and error-detail hygiene for upstream calls.
//!
//! The upstream chat endpoint hands back a `conversation_id` on every reply.
//! A session keeps the latest one and attaches it to the next chat call.
//! Tokens are replaced, never merged, and only successful replies update
//! them.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::UpstreamReply;

/// Upstream bodies are cut to this many characters before they reach users.
pub const MAX_ERROR_DETAIL_CHARS: usize = 500;

/// Conversation context carried between upstream calls of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(conversation_id: impl Into<String>) -> Self {
        let id = conversation_id.into();
        Self {
            conversation_id: Some(id).filter(|id| !id.trim().is_empty()),
        }
    }

    /// Context after a successful reply: the reply's token wins when present.
    pub fn updated(&self, reply: &UpstreamReply) -> Self {
        match reply
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        {
            Some(id) => Self {
                conversation_id: Some(id.to_string()),
            },
            None => self.clone(),
        }
    }
}

static REDACTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(bearer)\s+[a-z0-9._\-~+/]+=*", "$1 [REDACTED]"),
        (
            r"(?i)\b(token|api[_\-]?key|secret|password|authorization)\b(\s*[:=]\s*)([^,\s]+)",
            "$1$2[REDACTED]",
        ),
        (r"(?i)\bsk-[a-z0-9\-]{10,}\b", "sk-[REDACTED]"),
        (r"(?i)\bapp-[a-z0-9]{10,}\b", "app-[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Mask credentials that upstream errors or transport messages may echo.
pub fn redact_sensitive_detail(raw: &str) -> String {
    let mut value = raw.to_string();
    for (re, replacement) in REDACTIONS.iter() {
        value = re.replace_all(&value, *replacement).into_owned();
    }
    value
}

/// Redact and cut an upstream body for inclusion in an error message.
pub fn error_detail(body: &str) -> String {
    let redacted = redact_sensitive_detail(body.trim());
    if redacted.chars().count() <= MAX_ERROR_DETAIL_CHARS {
        return redacted;
    }
    let mut cut: String = redacted.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
    cut.push_str("...");
    cut
}
