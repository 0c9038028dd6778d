//! Wizard sessions driven end to end through the public async API.
//!
//! A scripted gateway stands in for the upstream service and replays one
//! canned outcome per call.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use leancanvas::config::WorkflowConfig;
use leancanvas::domain::{ProductDetails, TaskKind};
use leancanvas::error::{UpstreamError, WorkflowError};
use leancanvas::llm::{SessionContext, UpstreamCall, UpstreamGateway, UpstreamReply};
use leancanvas::workflow::{Step, Workflow, WorkflowState};

struct Script {
    replies: Mutex<VecDeque<Result<UpstreamReply, UpstreamError>>>,
    calls: Mutex<Vec<UpstreamCall>>,
    delay: Duration,
}

impl Script {
    fn new(replies: Vec<Result<UpstreamReply, UpstreamError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(vec![Ok(UpstreamReply::text("late"))])
        }
    }

    fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamGateway for Script {
    async fn invoke(
        &self,
        call: &UpstreamCall,
        _session: &SessionContext,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.calls.lock().unwrap().push(call.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(UpstreamError::EmptyReply))
    }
}

fn reply(answer: Value, conversation_id: Option<&str>) -> Result<UpstreamReply, UpstreamError> {
    Ok(UpstreamReply {
        answer,
        conversation_id: conversation_id.map(str::to_string),
        message_id: None,
    })
}

fn personas_json() -> Value {
    json!({"personas": [{"id": 1, "description": "社会人", "needs": {"explicit": "a", "implicit": "b"}}]})
}

fn ideas_json() -> Value {
    json!([{"id": 1, "idea": "AI tutor"}, {"id": 2, "idea": "Quiz bot"}])
}

fn names_json() -> Value {
    json!({"productNames": [{"id": 1, "name": "Mentora", "reason": "warm", "pros": "short", "cons": "common"}]})
}

fn canvas_json() -> Value {
    json!({"problem": ["no time to study"], "solution": ["five-minute lessons"]})
}

fn details() -> ProductDetails {
    ProductDetails::new("EdTech", "adaptive quizzes", "friendly")
}

#[tokio::test]
async fn structured_personas_populate_state() {
    let gateway = Script::new(vec![reply(personas_json(), None)]);
    let mut workflow = Workflow::default();

    workflow.generate_personas(&gateway, "AI教育").await.unwrap();

    let state = workflow.state();
    assert_eq!(state.personas.len(), 1);
    assert_eq!(state.personas[0].id, 1);
    assert_eq!(state.keyword, "AI教育");
    assert_eq!(state.step, Step::PersonaSelection);
    assert_eq!(gateway.calls()[0].kind(), Some(TaskKind::Persona));
}

#[tokio::test]
async fn plain_text_personas_fall_back_to_line_scan() {
    let gateway = Script::new(vec![reply(
        json!("1. 忙しい社会人\n明示的ニーズ: 時短\n潜在的ニーズ: 信頼"),
        None,
    )]);
    let mut workflow = Workflow::default();

    workflow.generate_personas(&gateway, "AI教育").await.unwrap();

    let persona = &workflow.state().personas[0];
    assert_eq!(persona.id, 1);
    assert_eq!(persona.description, "忙しい社会人");
    assert_eq!(persona.needs.explicit, "時短");
    assert_eq!(persona.needs.implicit, "信頼");
}

#[tokio::test]
async fn failed_idea_request_keeps_previous_ideas() {
    let gateway = Script::new(vec![
        reply(personas_json(), None),
        Err(UpstreamError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
        }),
    ]);
    let mut workflow = Workflow::default();
    workflow.generate_personas(&gateway, "AI").await.unwrap();
    let before = workflow.state().clone();

    let err = workflow.select_persona(&gateway, 1).await.unwrap_err();

    assert!(matches!(err, WorkflowError::Upstream(UpstreamError::Status { status: 500, .. })));
    let state = workflow.state();
    assert_eq!(state.business_ideas, before.business_ideas);
    assert_eq!(state.selected_persona, None);
    assert!(!state.is_loading);
    assert!(state.error.as_deref().is_some_and(|e| !e.is_empty()));
    assert!(workflow.can_interact());
}

#[tokio::test]
async fn empty_answer_does_not_adopt_conversation() {
    let gateway = Script::new(vec![
        reply(personas_json(), Some("conv-1")),
        reply(json!(""), Some("conv-2")),
    ]);
    let mut workflow = Workflow::default();
    workflow.generate_personas(&gateway, "AI").await.unwrap();
    assert_eq!(workflow.state().conversation_id.as_deref(), Some("conv-1"));

    let err = workflow.select_persona(&gateway, 1).await.unwrap_err();

    assert!(matches!(err, WorkflowError::Upstream(UpstreamError::EmptyReply)));
    assert_eq!(workflow.state().conversation_id.as_deref(), Some("conv-1"));
    assert!(workflow.state().error.is_some());
}

#[tokio::test]
async fn full_session_exports_then_resets() {
    let gateway = Script::new(vec![
        reply(personas_json(), None),
        reply(ideas_json(), None),
        reply(names_json(), None),
        reply(canvas_json(), None),
    ]);
    let mut workflow = Workflow::new(WorkflowConfig::default());

    workflow.generate_personas(&gateway, "AI").await.unwrap();
    workflow.select_persona(&gateway, 1).await.unwrap();
    workflow.select_business_idea(2).unwrap();
    workflow.submit_product_details(&gateway, details()).await.unwrap();
    workflow.select_product_name(&gateway, 1).await.unwrap();

    assert_eq!(workflow.step(), Step::CanvasDisplay);
    let export = workflow.export().unwrap();
    assert_eq!(export.product_name, "Mentora");
    assert_eq!(export.business_idea.map(|i| i.idea).as_deref(), Some("Quiz bot"));
    assert_eq!(export.lean_canvas.problem, vec!["no time to study"]);
    assert!(export.lean_canvas.key_metrics.is_empty());

    let calls = gateway.calls();
    let UpstreamCall::Task { inputs, .. } = &calls[3] else {
        panic!("expected a task call, got {:?}", calls[3]);
    };
    assert_eq!(inputs["productName"], "Mentora");
    assert_eq!(inputs["brandImage"], "friendly");
    assert_eq!(inputs["businessIdea"], "Quiz bot");

    workflow.reset();
    assert_eq!(workflow.state(), &WorkflowState::initial());
}

#[tokio::test]
async fn back_then_forward_restores_step_without_refetch() {
    let gateway = Script::new(vec![reply(personas_json(), None), reply(ideas_json(), None)]);
    let mut workflow = Workflow::default();
    workflow.generate_personas(&gateway, "AI").await.unwrap();
    workflow.select_persona(&gateway, 1).await.unwrap();
    let before = workflow.state().clone();

    assert_eq!(workflow.go_back().unwrap(), Step::PersonaSelection);
    assert_eq!(workflow.go_forward().unwrap(), Step::IdeaSelection);
    assert_eq!(workflow.state(), &before);

    workflow.go_back().unwrap();
    workflow.select_persona(&gateway, 1).await.unwrap();
    assert_eq!(gateway.calls().len(), 2);
    assert_eq!(workflow.state().business_ideas, before.business_ideas);
}

#[tokio::test]
async fn slow_upstream_times_out_like_a_failure() {
    let gateway = Script::slow(Duration::from_millis(500));
    let mut workflow = Workflow::new(WorkflowConfig {
        timeout: Duration::from_millis(50),
    });

    let err = workflow.generate_personas(&gateway, "AI").await.unwrap_err();

    assert!(matches!(err, WorkflowError::Upstream(UpstreamError::Timeout { .. })));
    assert_eq!(workflow.step(), Step::KeywordEntry);
    assert!(workflow.state().personas.is_empty());
    assert!(workflow.state().error.is_some());
    assert!(workflow.can_interact());
}

#[tokio::test]
async fn unusable_personas_reply_is_reported() {
    let gateway = Script::new(vec![reply(json!({"personas": [{"name": "no id"}]}), None)]);
    let mut workflow = Workflow::default();

    let err = workflow.generate_personas(&gateway, "AI").await.unwrap_err();

    assert!(matches!(err, WorkflowError::Normalize(_)));
    assert_eq!(workflow.step(), Step::KeywordEntry);
}

#[tokio::test]
async fn unreadable_canvas_defaults_to_empty_sections() {
    let gateway = Script::new(vec![
        reply(personas_json(), None),
        reply(ideas_json(), None),
        reply(names_json(), None),
        reply(json!("sorry, I could not build a canvas"), None),
    ]);
    let mut workflow = Workflow::default();
    workflow.generate_personas(&gateway, "AI").await.unwrap();
    workflow.select_persona(&gateway, 1).await.unwrap();
    workflow.select_business_idea(1).unwrap();
    workflow.submit_product_details(&gateway, details()).await.unwrap();

    workflow.select_product_name(&gateway, 1).await.unwrap();

    let canvas = workflow.state().lean_canvas.clone().unwrap();
    assert!(canvas.is_empty());
    assert_eq!(workflow.step(), Step::CanvasDisplay);
}
