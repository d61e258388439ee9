//! Per-session conversation context and the result of one flow step.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::FlowState;
use crate::store::records::LeadStatus;

/// Placeholder used when the lead's first name is unknown; chosen so
/// greetings still read naturally ("Oi tudo bem!").
pub const FIRST_NAME_SENTINEL: &str = "tudo bem";

/// Keys of the qualification questions, in funnel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKey {
    PrimeiraInteracao,
    PatrimonioFaixa,
    OndeInveste,
    AvaliacaoSuporte,
    Objetivo,
    Prazo,
}

impl std::fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PrimeiraInteracao => "primeira_interacao",
            Self::PatrimonioFaixa => "patrimonio_faixa",
            Self::OndeInveste => "onde_investe",
            Self::AvaliacaoSuporte => "avaliacao_suporte",
            Self::Objetivo => "objetivo",
            Self::Prazo => "prazo",
        };
        write!(f, "{s}")
    }
}

/// Qualification verdict for a session.
///
/// `Unknown` means the predicate has not been evaluated yet; it is distinct
/// from `NotQualified`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifiedState {
    #[default]
    Unknown,
    Qualified,
    NotQualified,
}

/// Conversation context owned by a session, serialized into its
/// `contexto` column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowContext {
    /// Lead's first name, or [`FIRST_NAME_SENTINEL`].
    pub first_name: String,
    /// Collected answers keyed by question. Keys are added in funnel order
    /// and never removed.
    #[serde(default)]
    pub responses: IndexMap<QuestionKey, String>,
    /// Back-reference to the lead, for lookups only.
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    /// Qualification verdict once the predicate has run.
    #[serde(default)]
    pub qualified: QualifiedState,
    /// Chosen meeting slot, set only after scheduling.
    #[serde(default)]
    pub meeting_preference: Option<String>,
}

impl FlowContext {
    /// Build a fresh context, trimming the name and falling back to the
    /// sentinel when absent or blank.
    pub fn new(first_name: Option<&str>) -> Self {
        let name = first_name.map(str::trim).unwrap_or_default();
        Self {
            first_name: if name.is_empty() {
                FIRST_NAME_SENTINEL.to_string()
            } else {
                name.to_string()
            },
            responses: IndexMap::new(),
            lead_id: None,
            qualified: QualifiedState::Unknown,
            meeting_preference: None,
        }
    }

    /// Whether a real first name is known (not the sentinel).
    pub fn has_real_name(&self) -> bool {
        self.first_name != FIRST_NAME_SENTINEL
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Outcome of one flow step. The context itself is mutated in place by
/// [`super::QualificationFlow::next_step`].
#[derive(Debug, Clone)]
pub struct FlowResult {
    /// Reply to send to the lead; `None` on absorbing transitions.
    pub reply: Option<String>,
    /// State the session moves to.
    pub next_state: FlowState,
    /// Lead status to propagate, when this step decides one.
    pub lead_status: Option<LeadStatus>,
    /// Snapshot of the collected answers, persisted as qualification notes.
    pub notes: IndexMap<QuestionKey, String>,
    /// Whether the session should be closed (`ativa = false`).
    pub finalize_session: bool,
}
