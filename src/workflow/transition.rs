//! Pure transition table for [`WorkflowState`].
//!
//! Guards live in [`super::Workflow`]; `reduce` assumes they passed.

use crate::domain::{BusinessIdea, LeanCanvas, Persona, ProductDetails, ProductName};

use super::state::{Step, WorkflowState};

/// A committed change to the workflow state.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// An upstream request was issued.
    RequestStarted,
    /// Personas arrived for `keyword`. Downstream data is cleared.
    PersonasGenerated {
        keyword: String,
        personas: Vec<Persona>,
    },
    /// A persona was chosen. `ideas` is `None` when the stored list is
    /// reused for the same persona.
    PersonaSelected {
        persona: Persona,
        ideas: Option<Vec<BusinessIdea>>,
    },
    IdeaSelected(BusinessIdea),
    /// Names arrived for `details`.
    ProductDetailsSubmitted {
        details: ProductDetails,
        names: Vec<ProductName>,
    },
    /// A name was chosen. `canvas` is `None` when the stored canvas is reused.
    ProductNameSelected {
        name: ProductName,
        canvas: Option<LeanCanvas>,
    },
    /// Latest conversation token from a successful reply.
    ConversationAdopted(String),
    /// The request failed; `restore` is the pre-attempt state.
    RequestFailed {
        restore: Box<WorkflowState>,
        message: String,
    },
    StepBack,
    StepForward,
    Reset,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestStarted => "request_started",
            Self::PersonasGenerated { .. } => "personas_generated",
            Self::PersonaSelected { .. } => "persona_selected",
            Self::IdeaSelected(_) => "idea_selected",
            Self::ProductDetailsSubmitted { .. } => "product_details_submitted",
            Self::ProductNameSelected { .. } => "product_name_selected",
            Self::ConversationAdopted(_) => "conversation_adopted",
            Self::RequestFailed { .. } => "request_failed",
            Self::StepBack => "step_back",
            Self::StepForward => "step_forward",
            Self::Reset => "reset",
        }
    }
}

/// Apply `action` to `state`, producing the next state.
pub fn reduce(state: &WorkflowState, action: Action) -> WorkflowState {
    match action {
        Action::RequestStarted => WorkflowState {
            is_loading: true,
            error: None,
            ..state.clone()
        },
        Action::PersonasGenerated { keyword, personas } => WorkflowState {
            step: Step::PersonaSelection,
            keyword,
            personas,
            selected_persona: None,
            business_ideas: Vec::new(),
            selected_idea: None,
            product_names: Vec::new(),
            selected_product_name: None,
            lean_canvas: None,
            is_loading: false,
            error: None,
            ..state.clone()
        },
        Action::PersonaSelected {
            persona,
            ideas: Some(ideas),
        } => WorkflowState {
            step: Step::IdeaSelection,
            selected_persona: Some(persona),
            business_ideas: ideas,
            selected_idea: None,
            product_names: Vec::new(),
            selected_product_name: None,
            lean_canvas: None,
            is_loading: false,
            error: None,
            ..state.clone()
        },
        Action::PersonaSelected {
            persona,
            ideas: None,
        } => WorkflowState {
            step: Step::IdeaSelection,
            selected_persona: Some(persona),
            is_loading: false,
            error: None,
            ..state.clone()
        },
        Action::IdeaSelected(idea) => {
            let same = state.selected_idea.as_ref() == Some(&idea);
            let mut next = WorkflowState {
                step: Step::DetailsEntry,
                selected_idea: Some(idea),
                error: None,
                ..state.clone()
            };
            if !same {
                next.product_names = Vec::new();
                next.selected_product_name = None;
                next.lean_canvas = None;
            }
            next
        }
        Action::ProductDetailsSubmitted { details, names } => WorkflowState {
            step: Step::NameSelection,
            product_details: details,
            product_names: names,
            selected_product_name: None,
            lean_canvas: None,
            is_loading: false,
            error: None,
            ..state.clone()
        },
        Action::ProductNameSelected { name, canvas } => WorkflowState {
            step: Step::CanvasDisplay,
            selected_product_name: Some(name),
            lean_canvas: canvas.or_else(|| state.lean_canvas.clone()),
            is_loading: false,
            error: None,
            ..state.clone()
        },
        Action::ConversationAdopted(conversation_id) => WorkflowState {
            conversation_id: Some(conversation_id),
            ..state.clone()
        },
        Action::RequestFailed { restore, message } => WorkflowState {
            is_loading: false,
            error: Some(message),
            ..*restore
        },
        Action::StepBack => WorkflowState {
            step: state.step.prev().unwrap_or(state.step),
            error: None,
            ..state.clone()
        },
        Action::StepForward => WorkflowState {
            step: state.step.next().unwrap_or(state.step),
            error: None,
            ..state.clone()
        },
        Action::Reset => WorkflowState::initial(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PersonaNeeds;
    use pretty_assertions::assert_eq;

    fn persona(id: i64) -> Persona {
        Persona {
            id,
            description: format!("persona {id}"),
            needs: PersonaNeeds::default(),
        }
    }

    fn idea(id: i64) -> BusinessIdea {
        BusinessIdea {
            id,
            idea: format!("idea {id}"),
            persona_hint: None,
            method_hint: None,
        }
    }

    #[test]
    fn request_started_only_touches_flags() {
        let state = WorkflowState {
            error: Some("old".to_string()),
            keyword: "AI".to_string(),
            ..WorkflowState::initial()
        };
        let next = reduce(&state, Action::RequestStarted);

        assert!(next.is_loading);
        assert_eq!(next.error, None);
        assert_eq!(next.keyword, "AI");
        assert_eq!(state.error.as_deref(), Some("old"));
    }

    #[test]
    fn new_persona_clears_downstream_data() {
        let state = WorkflowState {
            step: Step::PersonaSelection,
            personas: vec![persona(1), persona(2)],
            selected_persona: Some(persona(1)),
            business_ideas: vec![idea(1)],
            selected_idea: Some(idea(1)),
            lean_canvas: Some(LeanCanvas::default()),
            ..WorkflowState::initial()
        };
        let next = reduce(
            &state,
            Action::PersonaSelected {
                persona: persona(2),
                ideas: Some(vec![idea(7)]),
            },
        );

        assert_eq!(next.step, Step::IdeaSelection);
        assert_eq!(next.business_ideas, vec![idea(7)]);
        assert_eq!(next.selected_idea, None);
        assert_eq!(next.lean_canvas, None);
        assert_eq!(next.personas, state.personas);
    }

    #[test]
    fn reselecting_same_idea_keeps_names() {
        let names = vec![ProductName {
            id: 1,
            name: "Mentora".to_string(),
            reason: String::new(),
            pros: String::new(),
            cons: String::new(),
        }];
        let state = WorkflowState {
            step: Step::IdeaSelection,
            selected_idea: Some(idea(1)),
            product_names: names.clone(),
            ..WorkflowState::initial()
        };

        assert_eq!(reduce(&state, Action::IdeaSelected(idea(1))).product_names, names);
        assert!(reduce(&state, Action::IdeaSelected(idea(2))).product_names.is_empty());
    }

    #[test]
    fn failure_restores_snapshot_with_error() {
        let before = WorkflowState {
            step: Step::PersonaSelection,
            personas: vec![persona(1)],
            ..WorkflowState::initial()
        };
        let loading = reduce(&before, Action::RequestStarted);
        let failed = reduce(
            &loading,
            Action::RequestFailed {
                restore: Box::new(before.clone()),
                message: "upstream returned 500: boom".to_string(),
            },
        );

        assert_eq!(
            failed,
            WorkflowState {
                error: Some("upstream returned 500: boom".to_string()),
                ..before
            }
        );
    }

    #[test]
    fn steps_saturate_at_both_ends() {
        let initial = WorkflowState::initial();
        assert_eq!(reduce(&initial, Action::StepBack).step, Step::KeywordEntry);

        let last = WorkflowState {
            step: Step::CanvasDisplay,
            ..WorkflowState::initial()
        };
        assert_eq!(reduce(&last, Action::StepForward).step, Step::CanvasDisplay);
        assert_eq!(reduce(&last, Action::Reset), WorkflowState::initial());
    }
}
