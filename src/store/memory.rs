//! In-memory `RecordStore` backend.
//!
//! Reference implementation used by tests and local runs. A single lock
//! over all tables makes the active-session uniqueness check atomic, the
//! same guarantee a SQL backend gets from a unique partial index.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::StoreError;

use super::records::{
    Lead, LeadStatus, LeadUpdate, Meeting, NewLead, NewMeeting, NewMessage, NewQualification,
    NewSession, Qualification, QualificationUpdate, Session, SessionUpdate, StoredMessage,
};
use super::traits::RecordStore;

#[derive(Debug, Default)]
struct Tables {
    leads: Vec<Lead>,
    sessions: Vec<Session>,
    messages: Vec<StoredMessage>,
    qualifications: Vec<Qualification>,
    meetings: Vec<Meeting>,
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages recorded for a lead, in insertion order. Test helper.
    pub async fn messages_for_lead(&self, lead_id: Uuid) -> Vec<StoredMessage> {
        let tables = self.tables.lock().await;
        tables
            .messages
            .iter()
            .filter(|m| m.lead_id == lead_id)
            .cloned()
            .collect()
    }

    /// All meetings recorded for a lead. Test helper.
    pub async fn meetings_for_lead(&self, lead_id: Uuid) -> Vec<Meeting> {
        let tables = self.tables.lock().await;
        tables
            .meetings
            .iter()
            .filter(|m| m.lead_id == lead_id)
            .cloned()
            .collect()
    }

    /// Current snapshot of a lead. Test helper.
    pub async fn lead(&self, id: Uuid) -> Option<Lead> {
        let tables = self.tables.lock().await;
        tables.leads.iter().find(|l| l.id == id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_lead(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let mut tables = self.tables.lock().await;
        let record = Lead {
            id: Uuid::new_v4(),
            nome: lead.nome,
            telefone: lead.telefone,
            canal: lead.canal,
            status: LeadStatus::Novo,
            created_at: Utc::now(),
        };
        tables.leads.push(record.clone());
        Ok(record)
    }

    async fn get_lead_by_phone(&self, telefone: &str) -> Result<Option<Lead>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .leads
            .iter()
            .find(|l| l.telefone == telefone)
            .cloned())
    }

    async fn update_lead(&self, id: Uuid, update: LeadUpdate) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let lead = tables
            .leads
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "lead".to_string(),
                id: id.to_string(),
            })?;
        if let Some(nome) = update.nome {
            lead.nome = nome;
        }
        if let Some(status) = update.status {
            lead.status = status;
        }
        Ok(())
    }

    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables
            .sessions
            .iter()
            .any(|s| s.lead_id == session.lead_id && s.ativa)
        {
            return Err(StoreError::Constraint(format!(
                "lead {} already has an active session",
                session.lead_id
            )));
        }
        let now = Utc::now();
        let record = Session {
            id: Uuid::new_v4(),
            lead_id: session.lead_id,
            estado: session.estado,
            contexto: session.contexto,
            ativa: true,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(record.clone());
        Ok(record)
    }

    async fn get_active_session(&self, lead_id: Uuid) -> Result<Option<Session>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .iter()
            .find(|s| s.lead_id == lead_id && s.ativa)
            .cloned())
    }

    async fn update_session(&self, id: Uuid, update: SessionUpdate) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "session".to_string(),
                id: id.to_string(),
            })?;
        if let Some(estado) = update.estado {
            session.estado = estado;
        }
        if let Some(contexto) = update.contexto {
            session.contexto = contexto;
        }
        if let Some(ativa) = update.ativa {
            session.ativa = ativa;
        }
        session.updated_at = Utc::now();
        Ok(())
    }

    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        let mut tables = self.tables.lock().await;
        let record = StoredMessage {
            id: Uuid::new_v4(),
            session_id: message.session_id,
            lead_id: message.lead_id,
            conteudo: message.conteudo,
            tipo: message.tipo,
            metadata: message.metadata,
            created_at: Utc::now(),
        };
        tables.messages.push(record.clone());
        Ok(record)
    }

    async fn get_qualification(
        &self,
        lead_id: Uuid,
    ) -> Result<Option<Qualification>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .qualifications
            .iter()
            .find(|q| q.lead_id == lead_id)
            .cloned())
    }

    async fn create_qualification(
        &self,
        qualification: NewQualification,
    ) -> Result<Qualification, StoreError> {
        let mut tables = self.tables.lock().await;
        let now = Utc::now();
        let record = Qualification {
            id: Uuid::new_v4(),
            lead_id: qualification.lead_id,
            session_id: qualification.session_id,
            respostas: qualification.respostas,
            resultado: qualification.resultado,
            created_at: now,
            updated_at: now,
        };
        tables.qualifications.push(record.clone());
        Ok(record)
    }

    async fn update_qualification(
        &self,
        id: Uuid,
        update: QualificationUpdate,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let qualification = tables
            .qualifications
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "qualification".to_string(),
                id: id.to_string(),
            })?;
        if let Some(respostas) = update.respostas {
            qualification.respostas = respostas;
        }
        if let Some(resultado) = update.resultado {
            qualification.resultado = resultado;
        }
        qualification.updated_at = Utc::now();
        Ok(())
    }

    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, StoreError> {
        let mut tables = self.tables.lock().await;
        let record = Meeting {
            id: Uuid::new_v4(),
            lead_id: meeting.lead_id,
            session_id: meeting.session_id,
            preferencia: meeting.preferencia,
            booking_link: meeting.booking_link,
            created_at: Utc::now(),
        };
        tables.meetings.push(record.clone());
        Ok(record)
    }
}
