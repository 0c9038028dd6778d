//! Lean canvas record and its one-way JSON export.

use serde::{Deserialize, Serialize};

use super::{BusinessIdea, Persona, ProductDetails};

/// One of the nine lean canvas sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanvasSection {
    Problem,
    Solution,
    KeyMetrics,
    UniqueValueProposition,
    UnfairAdvantage,
    Channels,
    CustomerSegments,
    CostStructure,
    RevenueStreams,
}

impl CanvasSection {
    /// Display order on the rendered canvas.
    pub const ALL: [CanvasSection; 9] = [
        CanvasSection::Problem,
        CanvasSection::Solution,
        CanvasSection::UniqueValueProposition,
        CanvasSection::UnfairAdvantage,
        CanvasSection::CustomerSegments,
        CanvasSection::KeyMetrics,
        CanvasSection::Channels,
        CanvasSection::CostStructure,
        CanvasSection::RevenueStreams,
    ];

    /// Canonical (camelCase) key.
    pub fn key(self) -> &'static str {
        match self {
            Self::Problem => "problem",
            Self::Solution => "solution",
            Self::KeyMetrics => "keyMetrics",
            Self::UniqueValueProposition => "uniqueValueProposition",
            Self::UnfairAdvantage => "unfairAdvantage",
            Self::Channels => "channels",
            Self::CustomerSegments => "customerSegments",
            Self::CostStructure => "costStructure",
            Self::RevenueStreams => "revenueStreams",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Problem => "Problem",
            Self::Solution => "Solution",
            Self::KeyMetrics => "Key Metrics",
            Self::UniqueValueProposition => "Unique Value Proposition",
            Self::UnfairAdvantage => "Unfair Advantage",
            Self::Channels => "Channels",
            Self::CustomerSegments => "Customer Segments",
            Self::CostStructure => "Cost Structure",
            Self::RevenueStreams => "Revenue Streams",
        }
    }

    /// Resolve a key in camelCase, snake_case or kebab-case.
    pub fn from_key(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| *c != '_' && *c != '-' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|section| section.key().to_ascii_lowercase() == folded)
    }
}

/// Nine-section one-page business model.
///
/// The default value (all sections empty) is the fallback whenever a canvas
/// reply cannot be parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeanCanvas {
    #[serde(default)]
    pub problem: Vec<String>,
    #[serde(default)]
    pub solution: Vec<String>,
    #[serde(default)]
    pub key_metrics: Vec<String>,
    #[serde(default)]
    pub unique_value_proposition: Vec<String>,
    #[serde(default)]
    pub unfair_advantage: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub customer_segments: Vec<String>,
    #[serde(default)]
    pub cost_structure: Vec<String>,
    #[serde(default)]
    pub revenue_streams: Vec<String>,
}

impl LeanCanvas {
    pub fn section(&self, section: CanvasSection) -> &[String] {
        match section {
            CanvasSection::Problem => &self.problem,
            CanvasSection::Solution => &self.solution,
            CanvasSection::KeyMetrics => &self.key_metrics,
            CanvasSection::UniqueValueProposition => &self.unique_value_proposition,
            CanvasSection::UnfairAdvantage => &self.unfair_advantage,
            CanvasSection::Channels => &self.channels,
            CanvasSection::CustomerSegments => &self.customer_segments,
            CanvasSection::CostStructure => &self.cost_structure,
            CanvasSection::RevenueStreams => &self.revenue_streams,
        }
    }

    pub fn section_mut(&mut self, section: CanvasSection) -> &mut Vec<String> {
        match section {
            CanvasSection::Problem => &mut self.problem,
            CanvasSection::Solution => &mut self.solution,
            CanvasSection::KeyMetrics => &mut self.key_metrics,
            CanvasSection::UniqueValueProposition => &mut self.unique_value_proposition,
            CanvasSection::UnfairAdvantage => &mut self.unfair_advantage,
            CanvasSection::Channels => &mut self.channels,
            CanvasSection::CustomerSegments => &mut self.customer_segments,
            CanvasSection::CostStructure => &mut self.cost_structure,
            CanvasSection::RevenueStreams => &mut self.revenue_streams,
        }
    }

    /// True when every section is empty.
    pub fn is_empty(&self) -> bool {
        CanvasSection::ALL
            .iter()
            .all(|section| self.section(*section).is_empty())
    }

    /// Render the canvas as Markdown, one heading per section.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for section in CanvasSection::ALL {
            out.push_str("## ");
            out.push_str(section.title());
            out.push('\n');
            let bullets = self.section(section);
            if bullets.is_empty() {
                out.push_str("*no data*\n");
            }
            for bullet in bullets {
                out.push_str("- ");
                out.push_str(bullet);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

/// Downloadable snapshot of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasExport {
    pub product_name: String,
    pub keyword: String,
    pub persona: Option<Persona>,
    pub business_idea: Option<BusinessIdea>,
    pub product_details: ProductDetails,
    pub lean_canvas: LeanCanvas,
}

impl CanvasExport {
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `<productName>_lean_canvas.json` with path-hostile characters replaced.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .product_name
            .trim()
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();
        let stem = if stem.is_empty() || stem.chars().all(|c| c == '.') {
            "untitled".to_string()
        } else {
            stem
        };
        format!("{stem}_lean_canvas.json")
    }
}
