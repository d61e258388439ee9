//! Session orchestration — lifecycle, side effects, and dynamic copy.

pub mod orchestrator;
pub mod render;

pub use orchestrator::{InboundOutcome, SessionOrchestrator, StartOutcome};
