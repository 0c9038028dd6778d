use serde_json::{Map, Value};

use crate::config::WorkflowConfig;
use crate::domain::{CanvasExport, Persona, ProductDetails, ProductName, TaskKind};
use crate::error::{UpstreamError, WorkflowError};
use crate::llm::{SessionContext, UpstreamCall, UpstreamGateway, UpstreamReply};
use crate::normalize;

use super::state::{Step, WorkflowState};
use super::transition::{Action, reduce};

/// What an in-flight request will commit on success.
#[derive(Debug, Clone, PartialEq)]
enum Pending {
    Personas { keyword: String },
    Ideas { persona: Persona },
    Names { details: ProductDetails },
    Canvas { name: ProductName },
}

impl Pending {
    fn task(&self) -> TaskKind {
        match self {
            Self::Personas { .. } => TaskKind::Persona,
            Self::Ideas { .. } => TaskKind::BusinessIdea,
            Self::Names { .. } => TaskKind::ProductName,
            Self::Canvas { .. } => TaskKind::Canvas,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    pending: Pending,
    snapshot: WorkflowState,
}

/// Wizard session: owns one [`WorkflowState`] and enforces single-flight.
///
/// Each operation comes in two phases. `begin_*` checks preconditions,
/// commits the loading state and returns the [`UpstreamCall`] to issue
/// (`None` when the step completes locally). [`Workflow::resolve`] commits
/// the outcome. The async helpers run both phases around one gateway call.
#[derive(Debug, Default)]
pub struct Workflow {
    state: WorkflowState,
    in_flight: Option<InFlight>,
    config: WorkflowConfig,
}

impl Workflow {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            state: WorkflowState::initial(),
            in_flight: None,
            config,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn step(&self) -> Step {
        self.state.step
    }

    /// False while a request is in flight; front ends disable input.
    pub fn can_interact(&self) -> bool {
        !self.state.is_loading
    }

    /// Session context for the next upstream call.
    pub fn session(&self) -> SessionContext {
        self.state
            .conversation_id
            .as_deref()
            .map(SessionContext::with_conversation)
            .unwrap_or_default()
    }

    fn apply(&mut self, action: Action) {
        let name = action.name();
        self.state = reduce(&self.state, action);
        tracing::debug!(action = name, step = self.state.step.index(), "workflow transition");
    }

    fn ensure_idle(&self) -> Result<(), WorkflowError> {
        if self.state.is_loading {
            Err(WorkflowError::RequestInFlight)
        } else {
            Ok(())
        }
    }

    fn ensure_step(&self, expected: Step) -> Result<(), WorkflowError> {
        self.ensure_idle()?;
        if self.state.step != expected {
            return Err(WorkflowError::InvalidStep {
                expected,
                actual: self.state.step,
            });
        }
        Ok(())
    }

    fn start(&mut self, pending: Pending, inputs: Map<String, Value>) -> UpstreamCall {
        let task = pending.task();
        self.in_flight = Some(InFlight {
            pending,
            snapshot: self.state.clone(),
        });
        self.apply(Action::RequestStarted);
        tracing::info!(task = %task, "workflow request started");
        UpstreamCall::task(task, inputs)
    }

    pub fn begin_generate_personas(&mut self, keyword: &str) -> Result<UpstreamCall, WorkflowError> {
        self.ensure_step(Step::KeywordEntry)?;
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(WorkflowError::Validation("keyword is required".to_string()));
        }

        let inputs = inputs([("keyword", Value::from(keyword))]);
        Ok(self.start(
            Pending::Personas {
                keyword: keyword.to_string(),
            },
            inputs,
        ))
    }

    pub fn begin_select_persona(
        &mut self,
        persona_id: i64,
    ) -> Result<Option<UpstreamCall>, WorkflowError> {
        self.ensure_step(Step::PersonaSelection)?;
        let persona = self
            .state
            .personas
            .iter()
            .find(|p| p.id == persona_id)
            .cloned()
            .ok_or(WorkflowError::UnknownSelection {
                kind: "persona",
                id: persona_id,
            })?;

        if self.state.selected_persona.as_ref() == Some(&persona)
            && !self.state.business_ideas.is_empty()
        {
            self.apply(Action::PersonaSelected {
                persona,
                ideas: None,
            });
            return Ok(None);
        }

        let inputs = inputs([
            ("keyword", Value::from(self.state.keyword.as_str())),
            ("personaId", Value::from(persona.id)),
            ("personaDescription", Value::from(persona.description.as_str())),
        ]);
        Ok(Some(self.start(Pending::Ideas { persona }, inputs)))
    }

    /// Local-only: no upstream task is needed to pick an idea.
    pub fn select_business_idea(&mut self, idea_id: i64) -> Result<(), WorkflowError> {
        self.ensure_step(Step::IdeaSelection)?;
        let idea = self
            .state
            .business_ideas
            .iter()
            .find(|i| i.id == idea_id)
            .cloned()
            .ok_or(WorkflowError::UnknownSelection {
                kind: "business idea",
                id: idea_id,
            })?;
        self.apply(Action::IdeaSelected(idea));
        Ok(())
    }

    pub fn begin_submit_product_details(
        &mut self,
        details: ProductDetails,
    ) -> Result<UpstreamCall, WorkflowError> {
        self.ensure_step(Step::DetailsEntry)?;
        let missing = details.missing_fields();
        if !missing.is_empty() {
            return Err(WorkflowError::Validation(format!(
                "missing product details: {}",
                missing.join(", ")
            )));
        }
        let details = ProductDetails::new(
            details.category.trim(),
            details.features.trim(),
            details.brand_image.trim(),
        );

        let mut inputs = self.context_inputs();
        insert_details(&mut inputs, &details);
        Ok(self.start(Pending::Names { details }, inputs))
    }

    pub fn begin_select_product_name(
        &mut self,
        name_id: i64,
    ) -> Result<Option<UpstreamCall>, WorkflowError> {
        self.ensure_step(Step::NameSelection)?;
        let name = self
            .state
            .product_names
            .iter()
            .find(|n| n.id == name_id)
            .cloned()
            .ok_or(WorkflowError::UnknownSelection {
                kind: "product name",
                id: name_id,
            })?;

        if self.state.selected_product_name.as_ref() == Some(&name)
            && self.state.lean_canvas.is_some()
        {
            self.apply(Action::ProductNameSelected { name, canvas: None });
            return Ok(None);
        }

        let mut inputs = self.context_inputs();
        inputs.insert("productName".to_string(), Value::from(name.name.as_str()));
        insert_details(&mut inputs, &self.state.product_details);
        Ok(Some(self.start(Pending::Canvas { name }, inputs)))
    }

    fn context_inputs(&self) -> Map<String, Value> {
        let persona = self
            .state
            .selected_persona
            .as_ref()
            .map(|p| p.description.as_str())
            .unwrap_or_default();
        let idea = self
            .state
            .selected_idea
            .as_ref()
            .map(|i| i.idea.as_str())
            .unwrap_or_default();
        inputs([
            ("keyword", Value::from(self.state.keyword.as_str())),
            ("personaDescription", Value::from(persona)),
            ("businessIdea", Value::from(idea)),
        ])
    }

    /// Commit the outcome of the in-flight request.
    ///
    /// Failures restore the pre-attempt state with `error` set and are also
    /// returned to the caller.
    pub fn resolve(
        &mut self,
        outcome: Result<UpstreamReply, UpstreamError>,
    ) -> Result<(), WorkflowError> {
        let InFlight { pending, snapshot } =
            self.in_flight.take().ok_or(WorkflowError::NothingPending)?;
        let task = pending.task();

        match self.commit(pending, outcome) {
            Ok(()) => {
                tracing::info!(task = %task, step = self.state.step.index(), "workflow request completed");
                Ok(())
            }
            Err(err) => {
                let payload = err.to_error_payload();
                tracing::warn!(task = %task, code = payload.code, "workflow request failed: {}", payload.message);
                self.apply(Action::RequestFailed {
                    restore: Box::new(snapshot),
                    message: payload.message,
                });
                Err(err)
            }
        }
    }

    fn commit(
        &mut self,
        pending: Pending,
        outcome: Result<UpstreamReply, UpstreamError>,
    ) -> Result<(), WorkflowError> {
        let reply = outcome?.ensure_answer()?;
        let action = match pending {
            Pending::Personas { keyword } => Action::PersonasGenerated {
                keyword,
                personas: normalize::normalize_personas(&reply.answer)?,
            },
            Pending::Ideas { persona } => Action::PersonaSelected {
                persona,
                ideas: Some(normalize::normalize_business_ideas(&reply.answer)?),
            },
            Pending::Names { details } => Action::ProductDetailsSubmitted {
                details,
                names: normalize::normalize_product_names(&reply.answer)?,
            },
            Pending::Canvas { name } => Action::ProductNameSelected {
                name,
                canvas: Some(normalize::normalize_canvas(&reply.answer)),
            },
        };

        if let Some(conversation_id) = self.session().updated(&reply).conversation_id
            && self.state.conversation_id.as_deref() != Some(conversation_id.as_str())
        {
            self.apply(Action::ConversationAdopted(conversation_id));
        }
        self.apply(action);
        Ok(())
    }

    /// Move one step back; stored data is kept for re-selection.
    pub fn go_back(&mut self) -> Result<Step, WorkflowError> {
        self.ensure_idle()?;
        if self.state.step.prev().is_none() {
            return Err(WorkflowError::AtBoundary {
                step: self.state.step,
                direction: "back",
            });
        }
        self.apply(Action::StepBack);
        Ok(self.state.step)
    }

    /// Move one step forward when the next step's data is already present.
    pub fn go_forward(&mut self) -> Result<Step, WorkflowError> {
        self.ensure_idle()?;
        match self.state.step.next() {
            Some(next) if self.state.has_data_for(next) => {
                self.apply(Action::StepForward);
                Ok(self.state.step)
            }
            _ => Err(WorkflowError::AtBoundary {
                step: self.state.step,
                direction: "forward",
            }),
        }
    }

    /// Return to the initial state, discarding any in-flight request.
    pub fn reset(&mut self) {
        if self.in_flight.take().is_some() {
            tracing::info!("reset discarded an in-flight request");
        }
        self.apply(Action::Reset);
    }

    pub fn export(&self) -> Result<CanvasExport, WorkflowError> {
        if self.state.step != Step::CanvasDisplay {
            return Err(WorkflowError::InvalidStep {
                expected: Step::CanvasDisplay,
                actual: self.state.step,
            });
        }
        Ok(CanvasExport {
            product_name: self
                .state
                .selected_product_name
                .as_ref()
                .map(|n| n.name.clone())
                .unwrap_or_default(),
            keyword: self.state.keyword.clone(),
            persona: self.state.selected_persona.clone(),
            business_idea: self.state.selected_idea.clone(),
            product_details: self.state.product_details.clone(),
            lean_canvas: self.state.lean_canvas.clone().unwrap_or_default(),
        })
    }

    /// Issue `call` under the configured timeout and resolve the outcome.
    pub async fn dispatch(
        &mut self,
        gateway: &dyn UpstreamGateway,
        call: UpstreamCall,
    ) -> Result<(), WorkflowError> {
        let session = self.session();
        let timeout = self.config.timeout;
        let outcome = match tokio::time::timeout(timeout, gateway.invoke(&call, &session)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(UpstreamError::Timeout { timeout }),
        };
        self.resolve(outcome)
    }

    async fn dispatch_optional(
        &mut self,
        gateway: &dyn UpstreamGateway,
        call: Option<UpstreamCall>,
    ) -> Result<(), WorkflowError> {
        match call {
            Some(call) => self.dispatch(gateway, call).await,
            None => Ok(()),
        }
    }

    pub async fn generate_personas(
        &mut self,
        gateway: &dyn UpstreamGateway,
        keyword: &str,
    ) -> Result<(), WorkflowError> {
        let call = self.begin_generate_personas(keyword)?;
        self.dispatch(gateway, call).await
    }

    pub async fn select_persona(
        &mut self,
        gateway: &dyn UpstreamGateway,
        persona_id: i64,
    ) -> Result<(), WorkflowError> {
        let call = self.begin_select_persona(persona_id)?;
        self.dispatch_optional(gateway, call).await
    }

    pub async fn submit_product_details(
        &mut self,
        gateway: &dyn UpstreamGateway,
        details: ProductDetails,
    ) -> Result<(), WorkflowError> {
        let call = self.begin_submit_product_details(details)?;
        self.dispatch(gateway, call).await
    }

    pub async fn select_product_name(
        &mut self,
        gateway: &dyn UpstreamGateway,
        name_id: i64,
    ) -> Result<(), WorkflowError> {
        let call = self.begin_select_product_name(name_id)?;
        self.dispatch_optional(gateway, call).await
    }
}

fn inputs<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn insert_details(inputs: &mut Map<String, Value>, details: &ProductDetails) {
    inputs.insert("category".to_string(), Value::from(details.category.as_str()));
    inputs.insert("features".to_string(), Value::from(details.features.as_str()));
    inputs.insert(
        "brandImage".to_string(),
        Value::from(details.brand_image.as_str()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn personas_reply() -> UpstreamReply {
        UpstreamReply::text(
            r#"{"personas":[{"id":1,"description":"Busy parent","needs":{"explicit":"a","implicit":"b"}},{"id":2,"description":"Student"}]}"#,
        )
    }

    fn ideas_reply() -> UpstreamReply {
        UpstreamReply {
            answer: json!({"ideas": [{"id": 1, "idea": "AI tutor"}, {"id": 2, "idea": "Peer review app"}]}),
            conversation_id: None,
            message_id: None,
        }
    }

    fn names_reply() -> UpstreamReply {
        UpstreamReply::text("1. Mentora\n理由: mentor + era\n2. Kotonoha\n")
    }

    fn canvas_reply() -> UpstreamReply {
        UpstreamReply::text(r#"{"problem": ["no time"], "solution": ["micro lessons"]}"#)
    }

    fn details() -> ProductDetails {
        ProductDetails::new("EdTech", "adaptive lessons", "friendly")
    }

    fn at_name_selection() -> Workflow {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI教育").unwrap();
        wf.resolve(Ok(personas_reply())).unwrap();
        wf.begin_select_persona(1).unwrap();
        wf.resolve(Ok(ideas_reply())).unwrap();
        wf.select_business_idea(2).unwrap();
        wf.begin_submit_product_details(details()).unwrap();
        wf.resolve(Ok(names_reply())).unwrap();
        wf
    }

    #[test]
    fn generate_personas_builds_task_call_and_advances() {
        let mut wf = Workflow::default();
        let call = wf.begin_generate_personas("  AI教育 ").unwrap();

        assert_eq!(
            call,
            UpstreamCall::task(TaskKind::Persona, inputs([("keyword", json!("AI教育"))]))
        );
        assert!(!wf.can_interact());

        wf.resolve(Ok(personas_reply())).unwrap();
        let state = wf.state();
        assert_eq!(state.step, Step::PersonaSelection);
        assert_eq!(state.keyword, "AI教育");
        assert_eq!(state.personas.len(), 2);
        assert!(!state.is_loading);
        assert!(wf.can_interact());
    }

    #[test]
    fn blank_keyword_is_a_validation_error() {
        let mut wf = Workflow::default();
        let err = wf.begin_generate_personas("   ").unwrap_err();

        assert!(matches!(err, WorkflowError::Validation(_)));
        assert_eq!(wf.state(), &WorkflowState::initial());
    }

    #[test]
    fn operations_check_their_step() {
        let mut wf = Workflow::default();
        let err = wf.begin_select_persona(1).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::InvalidStep {
                expected: Step::PersonaSelection,
                actual: Step::KeywordEntry
            }
        ));
        assert!(wf.export().is_err());
    }

    #[test]
    fn second_operation_while_loading_is_rejected_without_effect() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        wf.resolve(Ok(personas_reply())).unwrap();
        wf.begin_select_persona(1).unwrap();
        let loading = wf.state().clone();

        assert!(matches!(
            wf.begin_select_persona(2),
            Err(WorkflowError::RequestInFlight)
        ));
        assert!(matches!(wf.go_back(), Err(WorkflowError::RequestInFlight)));
        assert!(matches!(wf.go_forward(), Err(WorkflowError::RequestInFlight)));
        assert_eq!(wf.state(), &loading);

        wf.resolve(Ok(ideas_reply())).unwrap();
        assert_eq!(wf.state().selected_persona.as_ref().map(|p| p.id), Some(1));
        assert_eq!(wf.state().business_ideas.len(), 2);
    }

    #[test]
    fn upstream_failure_reverts_selection_and_sets_error() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        wf.resolve(Ok(personas_reply())).unwrap();
        let before = wf.state().clone();

        wf.begin_select_persona(2).unwrap();
        let err = wf
            .resolve(Err(UpstreamError::Status {
                status: 500,
                message: "Internal Server Error".to_string(),
            }))
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Upstream(_)));
        let state = wf.state();
        assert_eq!(state.business_ideas, before.business_ideas);
        assert_eq!(state.selected_persona, None);
        assert_eq!(state.step, Step::PersonaSelection);
        assert!(!state.is_loading);
        assert_eq!(
            state.error.as_deref(),
            Some("upstream returned 500: Internal Server Error")
        );
    }

    #[test]
    fn empty_list_is_a_failure_with_step_unchanged() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        let err = wf
            .resolve(Ok(UpstreamReply::text("Sorry, I cannot help with that.")))
            .unwrap_err();

        assert!(matches!(err, WorkflowError::Normalize(_)));
        assert_eq!(wf.step(), Step::KeywordEntry);
        assert_eq!(
            wf.state().error.as_deref(),
            Some("no usable personas in upstream reply")
        );
    }

    #[test]
    fn empty_reply_keeps_conversation_token() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        wf.resolve(Ok(UpstreamReply {
            conversation_id: Some("conv-1".to_string()),
            ..personas_reply()
        }))
        .unwrap();
        assert_eq!(wf.state().conversation_id.as_deref(), Some("conv-1"));

        wf.begin_select_persona(1).unwrap();
        let err = wf
            .resolve(Ok(UpstreamReply {
                answer: json!("   "),
                conversation_id: Some("conv-2".to_string()),
                message_id: None,
            }))
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Upstream(UpstreamError::EmptyReply)
        ));
        assert_eq!(wf.state().conversation_id.as_deref(), Some("conv-1"));
        assert!(wf.state().error.is_some());
    }

    #[test]
    fn full_flow_then_export_and_reset() {
        let mut wf = at_name_selection();
        assert_eq!(wf.step(), Step::NameSelection);
        assert_eq!(wf.state().product_names[0].reason, "mentor + era");

        let call = wf.begin_select_product_name(1).unwrap().expect("canvas call");
        match &call {
            UpstreamCall::Task { kind, inputs } => {
                assert_eq!(*kind, TaskKind::Canvas);
                assert_eq!(inputs["productName"], "Mentora");
                assert_eq!(inputs["businessIdea"], "Peer review app");
                assert_eq!(inputs["personaDescription"], "Busy parent");
                assert_eq!(inputs["brandImage"], "friendly");
            }
            other => panic!("unexpected call {other:?}"),
        }
        wf.resolve(Ok(canvas_reply())).unwrap();
        assert_eq!(wf.step(), Step::CanvasDisplay);

        let export = wf.export().unwrap();
        assert_eq!(export.product_name, "Mentora");
        assert_eq!(export.keyword, "AI教育");
        assert_eq!(export.lean_canvas.problem, vec!["no time"]);
        assert_eq!(export.file_name(), "Mentora_lean_canvas.json");

        wf.reset();
        assert_eq!(wf.state(), &WorkflowState::initial());
    }

    #[test]
    fn back_then_forward_restores_step_and_lists() {
        let mut wf = at_name_selection();
        wf.begin_select_product_name(2).unwrap();
        wf.resolve(Ok(canvas_reply())).unwrap();

        let mut step = wf.step();
        while step != Step::KeywordEntry {
            let before = wf.state().clone();
            wf.go_back().unwrap();
            assert_eq!(wf.go_forward().unwrap(), step);
            assert_eq!(wf.state(), &before);
            step = wf.go_back().unwrap();
        }
        assert!(matches!(
            wf.go_back(),
            Err(WorkflowError::AtBoundary { direction: "back", .. })
        ));
    }

    #[test]
    fn reselecting_same_persona_skips_fetch() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        wf.resolve(Ok(personas_reply())).unwrap();
        wf.begin_select_persona(1).unwrap();
        wf.resolve(Ok(ideas_reply())).unwrap();

        wf.go_back().unwrap();
        assert_eq!(wf.begin_select_persona(1).unwrap(), None);
        assert_eq!(wf.step(), Step::IdeaSelection);
        assert_eq!(wf.state().business_ideas.len(), 2);

        wf.go_back().unwrap();
        assert!(wf.begin_select_persona(2).unwrap().is_some());
    }

    #[test]
    fn unknown_selection_and_incomplete_details_are_rejected() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        wf.resolve(Ok(personas_reply())).unwrap();
        assert!(matches!(
            wf.begin_select_persona(99),
            Err(WorkflowError::UnknownSelection { id: 99, .. })
        ));

        wf.begin_select_persona(1).unwrap();
        wf.resolve(Ok(ideas_reply())).unwrap();
        wf.select_business_idea(1).unwrap();
        let err = wf
            .begin_submit_product_details(ProductDetails::new("EdTech", "", " "))
            .unwrap_err();
        assert_eq!(err.to_string(), "missing product details: features, brandImage");
        assert!(wf.can_interact());
    }

    #[test]
    fn reset_mid_flight_rejects_late_resolve() {
        let mut wf = Workflow::default();
        wf.begin_generate_personas("AI").unwrap();
        wf.reset();

        assert!(matches!(
            wf.resolve(Ok(personas_reply())),
            Err(WorkflowError::NothingPending)
        ));
        assert_eq!(wf.state(), &WorkflowState::initial());
    }
}
