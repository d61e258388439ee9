//! Flow state machine — tracks where a lead is in the qualification funnel.

use serde::{Deserialize, Serialize};

/// The states of the qualification conversation.
///
/// Progresses linearly through the question states, branches at
/// OfferMeeting (accept → Scheduling, decline → NotInterested, unclear →
/// self-loop), and absorbs into Finished. The wire tags match the session
/// records of the production system, hence the Portuguese values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    #[serde(rename = "inicio")]
    WaitingFirstReply,
    #[serde(rename = "perguntar_patrimonio")]
    AskPatrimony,
    #[serde(rename = "perguntar_onde_investe")]
    AskInvestmentPlaces,
    #[serde(rename = "perguntar_qualidade_suporte")]
    AskSupport,
    #[serde(rename = "perguntar_objetivo")]
    AskObjective,
    #[serde(rename = "perguntar_prazo")]
    AskTimeframe,
    #[serde(rename = "oferecer_reuniao")]
    OfferMeeting,
    #[serde(rename = "agendamento")]
    Scheduling,
    #[serde(rename = "finalizado")]
    Finished,
    #[serde(rename = "finalizado_nao_interessado")]
    NotInterested,
}

impl FlowState {
    /// Whether this state is terminal (the funnel run is over).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::NotInterested)
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::WaitingFirstReply
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WaitingFirstReply => "inicio",
            Self::AskPatrimony => "perguntar_patrimonio",
            Self::AskInvestmentPlaces => "perguntar_onde_investe",
            Self::AskSupport => "perguntar_qualidade_suporte",
            Self::AskObjective => "perguntar_objetivo",
            Self::AskTimeframe => "perguntar_prazo",
            Self::OfferMeeting => "oferecer_reuniao",
            Self::Scheduling => "agendamento",
            Self::Finished => "finalizado",
            Self::NotInterested => "finalizado_nao_interessado",
        };
        write!(f, "{s}")
    }
}
