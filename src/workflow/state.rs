use serde::{Serialize, Serializer};

use crate::domain::{BusinessIdea, LeanCanvas, Persona, ProductDetails, ProductName};

/// The six wizard steps, in order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Step {
    #[default]
    KeywordEntry,
    PersonaSelection,
    IdeaSelection,
    DetailsEntry,
    NameSelection,
    CanvasDisplay,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::KeywordEntry,
        Step::PersonaSelection,
        Step::IdeaSelection,
        Step::DetailsEntry,
        Step::NameSelection,
        Step::CanvasDisplay,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::KeywordEntry => "Keyword Entry",
            Self::PersonaSelection => "Persona Selection",
            Self::IdeaSelection => "Idea Selection",
            Self::DetailsEntry => "Product Details",
            Self::NameSelection => "Name Selection",
            Self::CanvasDisplay => "Lean Canvas",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// `[3/6] Idea Selection`
    pub fn indicator(self) -> String {
        format!(
            "[{}/{}] {}",
            self.index() + 1,
            Self::ALL.len(),
            self.title()
        )
    }
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index())
    }
}

/// Single source of truth for one wizard session.
///
/// Values are replaced wholesale by [`super::reduce`]; nothing mutates a
/// state in place once it has been published.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub step: Step,
    pub keyword: String,
    pub personas: Vec<Persona>,
    pub selected_persona: Option<Persona>,
    pub business_ideas: Vec<BusinessIdea>,
    pub selected_idea: Option<BusinessIdea>,
    pub product_details: ProductDetails,
    pub product_names: Vec<ProductName>,
    pub selected_product_name: Option<ProductName>,
    pub lean_canvas: Option<LeanCanvas>,
    pub conversation_id: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl WorkflowState {
    pub fn initial() -> Self {
        Self::default()
    }

    /// Whether the data needed to display `step` is present.
    pub fn has_data_for(&self, step: Step) -> bool {
        match step {
            Step::KeywordEntry => true,
            Step::PersonaSelection => !self.personas.is_empty(),
            Step::IdeaSelection => {
                self.selected_persona.is_some() && !self.business_ideas.is_empty()
            }
            Step::DetailsEntry => self.selected_idea.is_some(),
            Step::NameSelection => !self.product_names.is_empty(),
            Step::CanvasDisplay => {
                self.selected_product_name.is_some() && self.lean_canvas.is_some()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_linear() {
        assert_eq!(Step::KeywordEntry.prev(), None);
        assert_eq!(Step::KeywordEntry.next(), Some(Step::PersonaSelection));
        assert_eq!(Step::CanvasDisplay.next(), None);
        assert_eq!(Step::from_index(3), Some(Step::DetailsEntry));
        assert_eq!(Step::from_index(6), None);
        for step in Step::ALL {
            assert_eq!(Step::from_index(step.index()), Some(step));
        }
    }

    #[test]
    fn indicator_is_one_based() {
        assert_eq!(Step::IdeaSelection.indicator(), "[3/6] Idea Selection");
        assert_eq!(Step::CanvasDisplay.indicator(), "[6/6] Lean Canvas");
    }

    #[test]
    fn state_serializes_step_as_number() {
        let value = serde_json::to_value(WorkflowState::initial()).expect("serialize state");
        assert_eq!(value["step"], 0);
        assert_eq!(value["isLoading"], false);
        assert!(value["leanCanvas"].is_null());
    }

    #[test]
    fn initial_state_has_only_keyword_entry_data() {
        let state = WorkflowState::initial();
        assert!(state.has_data_for(Step::KeywordEntry));
        assert!(!state.has_data_for(Step::PersonaSelection));
        assert!(!state.has_data_for(Step::CanvasDisplay));
    }
}
