//! Wizard state machine.
//!
//! `KeywordEntry -> PersonaSelection -> IdeaSelection -> DetailsEntry ->
//! NameSelection -> CanvasDisplay`, linear, with `reset` back to the start.
//! [`Workflow`] owns the state of exactly one session; there is no shared
//! or global instance.

mod machine;
mod state;
mod transition;

pub use self::machine::Workflow;
pub use self::state::{Step, WorkflowState};
pub use self::transition::{Action, reduce};
