//! Response normalization.
//!
//! Turns loosely structured upstream replies into validated domain records.
//! Each task runs an explicit, ordered list of strategies:
//!
//! 1. [`Strategy::Structured`]: the payload is already JSON; extract the
//!    task's array field (or the array itself).
//! 2. [`Strategy::JsonText`]: the payload is text holding a JSON document
//!    (whole, fenced, or embedded); re-run the structured extraction on it.
//! 3. [`Strategy::LineScan`]: numbered free text (list tasks only).
//!
//! Records missing their identifier or primary field are dropped, never
//! defaulted. Canvas normalization never fails; it falls back to the
//! all-empty canvas. All functions here are pure.

mod lines;
mod records;
mod text;

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;

use crate::domain::{BusinessIdea, LeanCanvas, Persona, ProductName, TaskKind};
use crate::error::NormalizeError;

pub use self::text::parse_json_text;

/// Normalization tier that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Structured,
    JsonText,
    LineScan,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::JsonText => "json_text",
            Self::LineScan => "line_scan",
        }
    }
}

/// Normalized output for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Normalized {
    Personas(Vec<Persona>),
    BusinessIdeas(Vec<BusinessIdea>),
    ProductNames(Vec<ProductName>),
    Canvas(LeanCanvas),
}

impl Normalized {
    pub fn task(&self) -> TaskKind {
        match self {
            Self::Personas(_) => TaskKind::Persona,
            Self::BusinessIdeas(_) => TaskKind::BusinessIdea,
            Self::ProductNames(_) => TaskKind::ProductName,
            Self::Canvas(_) => TaskKind::Canvas,
        }
    }

    /// JSON form as returned to BFF clients.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Normalize a raw upstream payload for `task`.
///
/// Fails with [`NormalizeError::MalformedUpstreamData`] only for list tasks
/// when every strategy yields zero usable records.
pub fn normalize(task: TaskKind, raw: &Value) -> Result<Normalized, NormalizeError> {
    Ok(match task {
        TaskKind::Persona => Normalized::Personas(normalize_personas(raw)?),
        TaskKind::BusinessIdea => Normalized::BusinessIdeas(normalize_business_ideas(raw)?),
        TaskKind::ProductName => Normalized::ProductNames(normalize_product_names(raw)?),
        TaskKind::Canvas => Normalized::Canvas(normalize_canvas(raw)),
    })
}

pub fn normalize_personas(raw: &Value) -> Result<Vec<Persona>, NormalizeError> {
    normalize_list(
        TaskKind::Persona,
        raw,
        records::persona,
        lines::personas,
        |p| p.id,
    )
}

pub fn normalize_business_ideas(raw: &Value) -> Result<Vec<BusinessIdea>, NormalizeError> {
    normalize_list(
        TaskKind::BusinessIdea,
        raw,
        records::business_idea,
        lines::business_ideas,
        |i| i.id,
    )
}

pub fn normalize_product_names(raw: &Value) -> Result<Vec<ProductName>, NormalizeError> {
    normalize_list(
        TaskKind::ProductName,
        raw,
        records::product_name,
        lines::product_names,
        |n| n.id,
    )
}

/// Normalize a canvas reply; total failure yields the all-empty canvas.
pub fn normalize_canvas(raw: &Value) -> LeanCanvas {
    let parsed = match raw {
        Value::Object(obj) => Some((Strategy::Structured, records::canvas(obj))),
        Value::String(text) => match parse_json_text(text) {
            Some(Value::Object(obj)) => Some((Strategy::JsonText, records::canvas(&obj))),
            _ => None,
        },
        _ => None,
    };

    match parsed {
        Some((strategy, canvas)) => {
            tracing::debug!(strategy = strategy.as_str(), "normalized canvas");
            canvas
        }
        None => {
            tracing::debug!("canvas reply unparsable, using empty canvas");
            LeanCanvas::default()
        }
    }
}

fn normalize_list<T>(
    task: TaskKind,
    raw: &Value,
    extract: fn(&Value) -> Option<T>,
    scan: fn(&str) -> Vec<T>,
    id_of: fn(&T) -> i64,
) -> Result<Vec<T>, NormalizeError> {
    let (strategy, records) = match raw {
        Value::Array(_) | Value::Object(_) => {
            (Strategy::Structured, structured(task, raw, extract))
        }
        Value::String(text) => {
            let from_json = parse_json_text(text)
                .filter(|value| value.is_array() || value.is_object())
                .map(|value| structured(task, &value, extract))
                .unwrap_or_default();
            if from_json.is_empty() {
                (Strategy::LineScan, scan(text))
            } else {
                (Strategy::JsonText, from_json)
            }
        }
        _ => (Strategy::Structured, Vec::new()),
    };

    let records = dedupe_by_id(records, id_of);
    if records.is_empty() {
        tracing::debug!(task = %task, "no usable records in upstream reply");
        return Err(NormalizeError::MalformedUpstreamData { task });
    }

    tracing::debug!(
        task = %task,
        strategy = strategy.as_str(),
        count = records.len(),
        "normalized upstream reply"
    );
    Ok(records)
}

fn structured<T>(task: TaskKind, payload: &Value, extract: fn(&Value) -> Option<T>) -> Vec<T> {
    let candidates = records::candidates(task, payload);
    let scanned = candidates.len();
    let accepted: Vec<T> = candidates.into_iter().filter_map(extract).collect();
    if accepted.len() < scanned {
        tracing::debug!(
            task = %task,
            dropped = scanned - accepted.len(),
            "dropped records missing id or primary field"
        );
    }
    accepted
}

/// Keep the first record for each id.
fn dedupe_by_id<T>(records: Vec<T>, id_of: fn(&T) -> i64) -> Vec<T> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(id_of(record)))
        .collect()
}
