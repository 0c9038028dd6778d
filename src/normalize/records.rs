//! Shape extraction from structured (JSON) upstream payloads.

use serde_json::{Map, Value};

use crate::domain::{
    BusinessIdea, CanvasSection, LeanCanvas, Persona, PersonaNeeds, ProductName, TaskKind,
};

/// Array-valued fields that may hold the records for a task.
fn list_keys(task: TaskKind) -> &'static [&'static str] {
    match task {
        TaskKind::Persona => &["personas"],
        TaskKind::BusinessIdea => &["businessIdeas", "business_ideas", "ideas"],
        TaskKind::ProductName => &["productNames", "product_names", "names"],
        TaskKind::Canvas => &[],
    }
}

/// Candidate record values inside a structured payload.
///
/// Returns the payload itself when it is an array, the first array-valued
/// field named after the task, or the object as a single candidate.
pub(crate) fn candidates(task: TaskKind, payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) => {
            for key in list_keys(task) {
                if let Some(Value::Array(items)) = obj.get(*key) {
                    return items.iter().collect();
                }
            }
            if obj.contains_key("id") {
                vec![payload]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}

/// Parse an integer identifier from a number or a numeric string.
pub(crate) fn id_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().trim_start_matches('#').trim().parse().ok(),
        _ => None,
    }
}

/// First non-blank string among `keys`. Arrays of strings are joined.
fn text_of(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Array(items) => {
            let parts: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn persona(value: &Value) -> Option<Persona> {
    let obj = value.as_object()?;
    let id = id_of(obj.get("id")?)?;
    let description = text_of(obj, &["description", "persona", "summary"])?;

    let nested = obj.get("needs").and_then(Value::as_object);
    let explicit = nested
        .and_then(|needs| text_of(needs, &["explicit", "explicitNeeds", "explicit_needs"]))
        .or_else(|| text_of(obj, &["explicitNeeds", "explicit_needs"]))
        .unwrap_or_default();
    let implicit = nested
        .and_then(|needs| {
            text_of(
                needs,
                &["implicit", "latent", "implicitNeeds", "implicit_needs"],
            )
        })
        .or_else(|| text_of(obj, &["implicitNeeds", "implicit_needs", "latentNeeds"]))
        .unwrap_or_default();

    Some(Persona {
        id,
        description,
        needs: PersonaNeeds { explicit, implicit },
    })
}

pub(crate) fn business_idea(value: &Value) -> Option<BusinessIdea> {
    let obj = value.as_object()?;
    let id = id_of(obj.get("id")?)?;
    let idea = text_of(obj, &["idea", "idea_text", "ideaText", "text"])?;

    Some(BusinessIdea {
        id,
        idea,
        persona_hint: text_of(obj, &["personaHint", "persona_hint", "persona"]),
        method_hint: text_of(
            obj,
            &[
                "methodHint",
                "method_hint",
                "osborneMethod",
                "osborne_method",
                "osbornMethod",
                "osborn_hint",
                "osbornHint",
            ],
        ),
    })
}

pub(crate) fn product_name(value: &Value) -> Option<ProductName> {
    let obj = value.as_object()?;
    let id = id_of(obj.get("id")?)?;
    let name = text_of(obj, &["name", "productName", "product_name"])?;

    Some(ProductName {
        id,
        name,
        reason: text_of(obj, &["reason", "rationale"]).unwrap_or_default(),
        pros: text_of(obj, &["pros", "merits", "advantages"]).unwrap_or_default(),
        cons: text_of(obj, &["cons", "demerits", "disadvantages"]).unwrap_or_default(),
    })
}

/// Extract a canvas from an object; unknown keys are ignored.
pub(crate) fn canvas(obj: &Map<String, Value>) -> LeanCanvas {
    let obj = ["leanCanvas", "lean_canvas", "canvas"]
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_object))
        .unwrap_or(obj);

    let mut canvas = LeanCanvas::default();
    for (key, value) in obj {
        if let Some(section) = CanvasSection::from_key(key) {
            *canvas.section_mut(section) = bullets(value);
        }
    }
    canvas
}

fn bullets(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Value::String(s) => s
            .lines()
            .map(|line| {
                line.trim()
                    .trim_start_matches(['-', '*', '•', '・'])
                    .trim()
                    .to_string()
            })
            .filter(|line| !line.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
