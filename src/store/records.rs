//! Persisted record types.
//!
//! Field names mirror the production tables (`leads`, `sessions`,
//! `messages`, `qualificacoes`, `reunioes`), hence the Portuguese columns
//! and wire tags.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::flow::{FlowContext, FlowState, QualifiedState, QuestionKey};

/// Lifecycle status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Novo,
    EmQualificacao,
    Qualificado,
    NaoQualificado,
    NaoInteressado,
    ReuniaoAgendada,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Novo => "novo",
            Self::EmQualificacao => "em_qualificacao",
            Self::Qualificado => "qualificado",
            Self::NaoQualificado => "nao_qualificado",
            Self::NaoInteressado => "nao_interessado",
            Self::ReuniaoAgendada => "reuniao_agendada",
        };
        write!(f, "{s}")
    }
}

/// Acquisition channel of a lead — selects the opening-message template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OriginChannel {
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "newsletter")]
    Newsletter,
    #[serde(rename = "ebook")]
    Ebook,
    #[serde(rename = "meta_ads")]
    MetaAds,
    #[serde(rename = "whatsapp")]
    WhatsApp,
    #[serde(rename = "planilha")]
    Spreadsheet,
}

impl OriginChannel {
    /// Parse a channel tag; unknown tags land on WhatsApp, the organic
    /// inbound channel.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "youtube" => Self::YouTube,
            "newsletter" => Self::Newsletter,
            "ebook" => Self::Ebook,
            "meta_ads" => Self::MetaAds,
            "planilha" => Self::Spreadsheet,
            _ => Self::WhatsApp,
        }
    }
}

impl std::fmt::Display for OriginChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::YouTube => "youtube",
            Self::Newsletter => "newsletter",
            Self::Ebook => "ebook",
            Self::MetaAds => "meta_ads",
            Self::WhatsApp => "whatsapp",
            Self::Spreadsheet => "planilha",
        };
        write!(f, "{s}")
    }
}

/// Direction of a persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDirection {
    Enviada,
    Recebida,
}

// ── Leads ───────────────────────────────────────────────────────────

/// A prospective customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub nome: String,
    pub telefone: String,
    pub canal: OriginChannel,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a lead.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub nome: String,
    pub telefone: String,
    pub canal: OriginChannel,
}

/// Partial lead update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct LeadUpdate {
    pub nome: Option<String>,
    pub status: Option<LeadStatus>,
}

// ── Sessions ────────────────────────────────────────────────────────

/// One qualification-funnel run for a lead.
///
/// Invariant (store-enforced): at most one session with `ativa = true`
/// per lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub estado: FlowState,
    pub contexto: FlowContext,
    pub ativa: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a session (created active).
#[derive(Debug, Clone)]
pub struct NewSession {
    pub lead_id: Uuid,
    pub estado: FlowState,
    pub contexto: FlowContext,
}

/// Partial session update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SessionUpdate {
    pub estado: Option<FlowState>,
    pub contexto: Option<FlowContext>,
    pub ativa: Option<bool>,
}

// ── Messages ────────────────────────────────────────────────────────

/// A persisted chat message, sent or received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub lead_id: Uuid,
    pub conteudo: String,
    pub tipo: MessageDirection,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Fields for recording a message.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub session_id: Option<Uuid>,
    pub lead_id: Uuid,
    pub conteudo: String,
    pub tipo: MessageDirection,
    pub metadata: serde_json::Value,
}

// ── Qualifications ──────────────────────────────────────────────────

/// Collected answers plus the qualification verdict for a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qualification {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub session_id: Uuid,
    pub respostas: IndexMap<QuestionKey, String>,
    pub resultado: QualifiedState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a qualification record.
#[derive(Debug, Clone)]
pub struct NewQualification {
    pub lead_id: Uuid,
    pub session_id: Uuid,
    pub respostas: IndexMap<QuestionKey, String>,
    pub resultado: QualifiedState,
}

/// Partial qualification update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct QualificationUpdate {
    pub respostas: Option<IndexMap<QuestionKey, String>>,
    pub resultado: Option<QualifiedState>,
}

// ── Meetings ────────────────────────────────────────────────────────

/// A scheduled advisory meeting, pending human confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub session_id: Uuid,
    pub preferencia: String,
    pub booking_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields for registering a meeting.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub lead_id: Uuid,
    pub session_id: Uuid,
    pub preferencia: String,
    pub booking_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_status_wire_tags() {
        let json = serde_json::to_string(&LeadStatus::ReuniaoAgendada).unwrap();
        assert_eq!(json, "\"reuniao_agendada\"");
        assert_eq!(format!("{}", LeadStatus::EmQualificacao), "em_qualificacao");
    }

    #[test]
    fn origin_channel_parse_round_trip() {
        for tag in ["youtube", "newsletter", "ebook", "meta_ads", "whatsapp", "planilha"] {
            let channel = OriginChannel::from_tag(tag);
            assert_eq!(format!("{channel}"), tag);
        }
    }

    #[test]
    fn origin_channel_unknown_tag_defaults() {
        assert_eq!(OriginChannel::from_tag("tiktok"), OriginChannel::WhatsApp);
        assert_eq!(OriginChannel::from_tag("  YouTube "), OriginChannel::YouTube);
        assert_eq!(OriginChannel::from_tag(""), OriginChannel::WhatsApp);
    }

    #[test]
    fn session_serde_round_trip() {
        let session = Session {
            id: Uuid::new_v4(),
            lead_id: Uuid::new_v4(),
            estado: FlowState::AskSupport,
            contexto: FlowContext::new(Some("Ana")),
            ativa: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["estado"], "perguntar_qualidade_suporte");
        let parsed: Session = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.estado, FlowState::AskSupport);
        assert_eq!(parsed.contexto.first_name, "Ana");
    }
}
