//! Line-oriented fallback for numbered free-text replies.
//!
//! A line starting with an ASCII ordinal (`1.`, `2)`, `3．`) opens a record
//! whose primary field is the rest of the line. Following lines of the
//! form `<label>: <value>` attach to the open record when the label is known
//! for the task.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{BusinessIdea, Persona, PersonaNeeds, ProductName, TaskKind};

static ORDINAL_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#+\s*)?(?:[-*•・]\s*)?(?:\*\*)?\s*([0-9]{1,6})\s*[.．)）]\s*([^0-9０-９].*)?$")
        .ok()
});

/// Labels longer than this are treated as prose, not field names.
const MAX_LABEL_CHARS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LineField {
    Primary,
    ExplicitNeeds,
    ImplicitNeeds,
    PersonaHint,
    MethodHint,
    Reason,
    Pros,
    Cons,
}

/// Label prefixes per field, checked in order.
fn label_table(task: TaskKind) -> &'static [(LineField, &'static [&'static str])] {
    match task {
        TaskKind::Persona => &[
            (LineField::ExplicitNeeds, &["明示", "顕在", "explicit"]),
            (
                LineField::ImplicitNeeds,
                &["潜在", "暗黙", "implicit", "latent", "hidden"],
            ),
            (LineField::Primary, &["説明", "ペルソナ", "description", "persona"]),
        ],
        TaskKind::BusinessIdea => &[
            (LineField::PersonaHint, &["ペルソナ", "対象", "persona", "target"]),
            (
                LineField::MethodHint,
                &["オズボーン", "発想", "ヒント", "osborn", "method", "hint"],
            ),
            (LineField::Primary, &["アイデア", "idea"]),
        ],
        TaskKind::ProductName => &[
            (LineField::Reason, &["理由", "由来", "reason", "rationale"]),
            (
                LineField::Cons,
                &["デメリット", "短所", "欠点", "cons", "demerit", "disadvantage"],
            ),
            (
                LineField::Pros,
                &["メリット", "長所", "利点", "pros", "merit", "advantage"],
            ),
            (
                LineField::Primary,
                &["プロダクト名", "名前", "product name", "name"],
            ),
        ],
        TaskKind::Canvas => &[],
    }
}

#[derive(Debug, Default)]
struct LineRecord {
    id: i64,
    primary: String,
    fields: HashMap<LineField, String>,
}

impl LineRecord {
    fn field(&self, field: LineField) -> String {
        self.fields.get(&field).cloned().unwrap_or_default()
    }

    fn hint(&self, field: LineField) -> Option<String> {
        self.fields.get(&field).cloned()
    }
}

/// Strip list bullets and Markdown emphasis around a fragment.
fn clean(fragment: &str) -> String {
    fragment
        .trim()
        .trim_start_matches(['-', '*', '•', '・'])
        .trim()
        .trim_matches('*')
        .trim()
        .to_string()
}

fn split_label(line: &str) -> Option<(String, String)> {
    let cleaned = clean(line);
    let split_at = cleaned.find([':', '：'])?;
    let sep_len = cleaned[split_at..].chars().next()?.len_utf8();
    let label = clean(&cleaned[..split_at]).to_lowercase();
    if label.is_empty() || label.chars().count() > MAX_LABEL_CHARS {
        return None;
    }
    let value = clean(&cleaned[split_at + sep_len..]);
    Some((label, value))
}

fn match_field(task: TaskKind, label: &str) -> Option<LineField> {
    label_table(task)
        .iter()
        .find(|(_, prefixes)| prefixes.iter().any(|p| label.starts_with(p)))
        .map(|(field, _)| *field)
}

fn scan(task: TaskKind, text: &str) -> Vec<LineRecord> {
    let Some(ordinal) = ORDINAL_LINE.as_ref() else {
        return Vec::new();
    };

    let mut records: Vec<LineRecord> = Vec::new();
    let mut open: Option<LineRecord> = None;

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = ordinal.captures(line)
            && let Ok(id) = caps[1].parse::<i64>()
        {
            if let Some(done) = open.take() {
                records.push(done);
            }
            let mut record = LineRecord {
                id,
                ..LineRecord::default()
            };
            let rest = clean(caps.get(2).map_or("", |m| m.as_str()));
            match split_label(&rest) {
                Some((label, value)) if match_field(task, &label) == Some(LineField::Primary) => {
                    record.primary = value;
                }
                _ => record.primary = rest.trim_end_matches([':', '：']).trim().to_string(),
            }
            open = Some(record);
            continue;
        }

        let Some(record) = open.as_mut() else {
            continue;
        };
        match split_label(line) {
            Some((label, value)) => match match_field(task, &label) {
                Some(LineField::Primary) if record.primary.is_empty() => record.primary = value,
                Some(LineField::Primary) | None => {}
                Some(field) if !value.is_empty() => {
                    record.fields.entry(field).or_insert(value);
                }
                Some(_) => {}
            },
            None if record.primary.is_empty() => record.primary = clean(line),
            None => {}
        }
    }

    if let Some(done) = open.take() {
        records.push(done);
    }
    records
}

pub(crate) fn personas(text: &str) -> Vec<Persona> {
    scan(TaskKind::Persona, text)
        .into_iter()
        .filter(|r| !r.primary.is_empty())
        .map(|r| Persona {
            id: r.id,
            needs: PersonaNeeds {
                explicit: r.field(LineField::ExplicitNeeds),
                implicit: r.field(LineField::ImplicitNeeds),
            },
            description: r.primary,
        })
        .collect()
}

pub(crate) fn business_ideas(text: &str) -> Vec<BusinessIdea> {
    scan(TaskKind::BusinessIdea, text)
        .into_iter()
        .filter(|r| !r.primary.is_empty())
        .map(|r| BusinessIdea {
            id: r.id,
            persona_hint: r.hint(LineField::PersonaHint),
            method_hint: r.hint(LineField::MethodHint),
            idea: r.primary,
        })
        .collect()
}

pub(crate) fn product_names(text: &str) -> Vec<ProductName> {
    scan(TaskKind::ProductName, text)
        .into_iter()
        .filter(|r| !r.primary.is_empty())
        .map(|r| ProductName {
            id: r.id,
            reason: r.field(LineField::Reason),
            pros: r.field(LineField::Pros),
            cons: r.field(LineField::Cons),
            name: r.primary,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_persona_with_japanese_labels() {
        let parsed = personas("1. 忙しい社会人\n明示的ニーズ: 時短\n潜在的ニーズ: 信頼");

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, 1);
        assert_eq!(parsed[0].description, "忙しい社会人");
        assert_eq!(parsed[0].needs.explicit, "時短");
        assert_eq!(parsed[0].needs.implicit, "信頼");
    }

    #[test]
    fn english_labels_full_width_colons_and_bullets() {
        let text = "Here are some personas:\n\n\
                    1. **Retired engineer**\n\
                    - Explicit needs: hobby projects\n\
                    - Implicit needs：staying useful\n\
                    2) Exam student\n\
                    * Latent needs: confidence\n";
        let parsed = personas(text);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].description, "Retired engineer");
        assert_eq!(parsed[0].needs.explicit, "hobby projects");
        assert_eq!(parsed[0].needs.implicit, "staying useful");
        assert_eq!(parsed[1].id, 2);
        assert_eq!(parsed[1].needs.explicit, "");
        assert_eq!(parsed[1].needs.implicit, "confidence");
    }

    #[test]
    fn ordinal_without_text_takes_next_plain_line() {
        let parsed = business_ideas("1.\nAI homework coach\nオズボーン: 転用\n");

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].idea, "AI homework coach");
        assert_eq!(parsed[0].method_hint.as_deref(), Some("転用"));
        assert_eq!(parsed[0].persona_hint, None);
    }

    #[test]
    fn records_without_primary_are_dropped() {
        let parsed = product_names("1.\n理由: nothing named\n2. Mentora\nメリット: short\nデメリット: generic");

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, 2);
        assert_eq!(parsed[0].name, "Mentora");
        assert_eq!(parsed[0].pros, "short");
        assert_eq!(parsed[0].cons, "generic");
    }

    #[test]
    fn labelled_primary_on_ordinal_line() {
        let parsed = product_names("3. 名前: Kotonoha\n理由: poetic");

        assert_eq!(parsed[0].name, "Kotonoha");
        assert_eq!(parsed[0].reason, "poetic");
    }

    #[test]
    fn decimal_numbers_do_not_open_records() {
        let parsed = personas("1. 忙しい社会人\n明示的ニーズ: 時短\n2.5時間の通勤をしている\n潜在的ニーズ: 信頼");

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, 1);
        assert_eq!(parsed[0].needs.explicit, "時短");
        assert_eq!(parsed[0].needs.implicit, "信頼");

        assert!(personas("1.5 million users").is_empty());
        assert_eq!(personas("1. 5 million users")[0].description, "5 million users");
    }

    #[test]
    fn text_without_ordinals_yields_nothing() {
        assert!(personas("明示的ニーズ: 時短").is_empty());
        assert!(personas("").is_empty());
    }
}
