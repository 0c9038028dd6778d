//! Typed records produced by normalization and held by the workflow.
//!
//! All records are immutable once built; the workflow replaces them
//! wholesale on every transition.

mod canvas;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use self::canvas::{CanvasExport, CanvasSection, LeanCanvas};

/// Kind of generation task sent to the upstream workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Persona,
    #[serde(rename = "businessidea")]
    BusinessIdea,
    #[serde(rename = "productname")]
    ProductName,
    Canvas,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::Persona,
        TaskKind::BusinessIdea,
        TaskKind::ProductName,
        TaskKind::Canvas,
    ];

    /// Wire name used in the upstream `inputs.task` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Persona => "persona",
            Self::BusinessIdea => "businessidea",
            Self::ProductName => "productname",
            Self::Canvas => "canvas",
        }
    }

    /// Plural label for the records this task produces.
    pub fn record_label(self) -> &'static str {
        match self {
            Self::Persona => "personas",
            Self::BusinessIdea => "business ideas",
            Self::ProductName => "product names",
            Self::Canvas => "canvas sections",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "persona" | "personas" => Ok(Self::Persona),
            "businessidea" | "businessideas" | "idea" | "ideas" => Ok(Self::BusinessIdea),
            "productname" | "productnames" | "name" | "names" => Ok(Self::ProductName),
            "canvas" | "leancanvas" => Ok(Self::Canvas),
            _ => Err(format!(
                "unknown task '{s}': expected 'persona', 'businessidea', 'productname', or 'canvas'"
            )),
        }
    }
}

/// Needs attributed to a persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaNeeds {
    #[serde(default)]
    pub explicit: String,
    #[serde(default)]
    pub implicit: String,
}

/// A generated target-customer persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub id: i64,
    pub description: String,
    #[serde(default)]
    pub needs: PersonaNeeds,
}

/// A generated business idea in canonical shape.
///
/// Upstream revisions emit either `idea`/`persona`/`osborneMethod` or
/// `idea_text`/`osborn_hint`; both normalize into this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessIdea {
    pub id: i64,
    pub idea: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method_hint: Option<String>,
}

/// A generated product name candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductName {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub pros: String,
    #[serde(default)]
    pub cons: String,
}

/// Product details entered by the user before naming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub features: String,
    #[serde(default)]
    pub brand_image: String,
}

impl ProductDetails {
    pub fn new(
        category: impl Into<String>,
        features: impl Into<String>,
        brand_image: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            features: features.into(),
            brand_image: brand_image.into(),
        }
    }

    /// Names of fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.category.trim().is_empty() {
            missing.push("category");
        }
        if self.features.trim().is_empty() {
            missing.push("features");
        }
        if self.brand_image.trim().is_empty() {
            missing.push("brandImage");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}
