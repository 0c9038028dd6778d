//! JSON-in-text recovery for free-text upstream replies.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static FENCED_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").ok());

/// Nested JSON-encoded strings are unwrapped at most this many times.
const MAX_STRING_UNWRAP: usize = 2;

/// Try to read a JSON document out of `text`.
///
/// Tries, in order: the whole text, the first Markdown code fence, and the
/// first balanced `{...}` / `[...]` block embedded in prose. A document that
/// is itself a JSON string is decoded again so double-encoded replies work.
pub fn parse_json_text(text: &str) -> Option<Value> {
    parse_json_text_depth(text, 0)
}

fn parse_json_text_depth(text: &str, depth: usize) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = serde_json::from_str::<Value>(trimmed)
        .ok()
        .or_else(|| fenced_json(trimmed))
        .or_else(|| embedded_json(trimmed))?;

    match value {
        Value::String(inner) if depth < MAX_STRING_UNWRAP => {
            parse_json_text_depth(&inner, depth + 1)
        }
        Value::String(_) => None,
        other => Some(other),
    }
}

fn fenced_json(text: &str) -> Option<Value> {
    let re = FENCED_BLOCK.as_ref()?;
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|body| serde_json::from_str::<Value>(body.as_str().trim()).ok())
}

fn embedded_json(text: &str) -> Option<Value> {
    let start = text.find(['{', '['])?;
    let end = balanced_end(&text[start..])?;
    serde_json::from_str::<Value>(&text[start..start + end]).ok()
}

/// Byte length of the balanced bracket block at the start of `text`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(idx + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}
