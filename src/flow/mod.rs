//! Qualification flow — pure state machine for the lead funnel.

pub mod context;
pub mod engine;
pub mod state;

pub use context::{FlowContext, FlowResult, QualifiedState, QuestionKey};
pub use engine::QualificationFlow;
pub use state::FlowState;
