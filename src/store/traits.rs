//! `RecordStore` trait — single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;

use super::records::{
    Lead, LeadUpdate, Meeting, NewLead, NewMeeting, NewMessage, NewQualification, NewSession,
    Qualification, QualificationUpdate, Session, SessionUpdate, StoredMessage,
};

/// Backend-agnostic record store covering leads, sessions, messages,
/// qualifications, and meetings.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ── Leads ───────────────────────────────────────────────────────

    /// Insert a new lead.
    async fn create_lead(&self, lead: NewLead) -> Result<Lead, StoreError>;

    /// Look up a lead by canonical phone number.
    async fn get_lead_by_phone(&self, telefone: &str) -> Result<Option<Lead>, StoreError>;

    /// Apply a partial update to a lead.
    async fn update_lead(&self, id: Uuid, update: LeadUpdate) -> Result<(), StoreError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Insert a new active session.
    ///
    /// Must fail with [`StoreError::Constraint`] when the lead already has
    /// an active session — this is the guard against the concurrent-start
    /// race, so backends have to enforce it atomically (e.g. a unique
    /// partial index on `(lead_id) WHERE ativa`).
    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError>;

    /// Get the lead's active session, if any.
    async fn get_active_session(&self, lead_id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Apply a partial update to a session.
    async fn update_session(&self, id: Uuid, update: SessionUpdate) -> Result<(), StoreError>;

    // ── Messages ────────────────────────────────────────────────────

    /// Record a sent or received message.
    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError>;

    // ── Qualifications ──────────────────────────────────────────────

    /// Get the lead's qualification record, if any.
    async fn get_qualification(&self, lead_id: Uuid)
        -> Result<Option<Qualification>, StoreError>;

    /// Insert a new qualification record.
    async fn create_qualification(
        &self,
        qualification: NewQualification,
    ) -> Result<Qualification, StoreError>;

    /// Apply a partial update to a qualification record.
    async fn update_qualification(
        &self,
        id: Uuid,
        update: QualificationUpdate,
    ) -> Result<(), StoreError>;

    // ── Meetings ────────────────────────────────────────────────────

    /// Register a meeting for human confirmation.
    async fn create_meeting(&self, meeting: NewMeeting) -> Result<Meeting, StoreError>;
}
