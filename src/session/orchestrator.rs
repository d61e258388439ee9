//! SessionOrchestrator — owns the session lifecycle and turns flow
//! transitions into persistence and outbound sends.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::delivery::DeliveryPipeline;
use crate::error::{Result, StoreError};
use crate::flow::{FlowContext, FlowResult, FlowState, QualificationFlow, QuestionKey};
use crate::metrics::Metrics;
use crate::store::records::{
    LeadStatus, LeadUpdate, MessageDirection, NewLead, NewMeeting, NewMessage, NewQualification,
    NewSession, OriginChannel, QualificationUpdate, Session, SessionUpdate,
};
use crate::store::traits::RecordStore;
use crate::transport::TransportGateway;

use super::render;

/// Name used when a lead messages us first and no contact name is known.
const FALLBACK_LEAD_NAME: &str = "Amigo";

/// Result of [`SessionOrchestrator::start`].
#[derive(Debug, Clone)]
pub struct StartOutcome {
    /// False when the opening message could not be delivered; the session
    /// exists either way, so retries are no-ops.
    pub ok: bool,
    pub session_id: Uuid,
    /// The rendered opening, present only when this call created the
    /// session.
    pub opening_message: Option<String>,
    pub error: Option<String>,
}

/// Result of [`SessionOrchestrator::handle_inbound`].
#[derive(Debug, Clone)]
pub struct InboundOutcome {
    pub ok: bool,
    pub session_id: Uuid,
    pub new_state: FlowState,
    /// Whether the reply reached (or was queued for) the transport.
    pub reply_sent: bool,
    /// Whether this step closed the session.
    pub finalized: bool,
}

/// Coordinates the qualification funnel: session lifecycle, flow engine
/// invocation, dynamic reply rendering, and record upkeep.
pub struct SessionOrchestrator {
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn TransportGateway>,
    delivery: Arc<DeliveryPipeline>,
    metrics: Arc<Metrics>,
    config: OrchestratorConfig,
    flow: QualificationFlow,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn TransportGateway>,
        delivery: Arc<DeliveryPipeline>,
        metrics: Arc<Metrics>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            transport,
            delivery,
            metrics,
            config,
            flow: QualificationFlow::new(),
        }
    }

    /// Open a qualification session for a lead and send the opening
    /// message. Idempotent: when an active session already exists the call
    /// is a no-op returning its id.
    pub async fn start(
        &self,
        lead_id: Uuid,
        phone: &str,
        name: Option<&str>,
        origin_channel: OriginChannel,
        extra_context: Option<serde_json::Value>,
        custom_opening: Option<&str>,
    ) -> Result<StartOutcome> {
        if let Some(existing) = self.store.get_active_session(lead_id).await? {
            info!(
                lead_id = %lead_id,
                session_id = %existing.id,
                "session already active, start is a no-op"
            );
            return Ok(StartOutcome {
                ok: true,
                session_id: existing.id,
                opening_message: None,
                error: None,
            });
        }

        let mut contexto = self.flow.initial_context(name);
        contexto.lead_id = Some(lead_id);
        let new_session = NewSession {
            lead_id,
            estado: FlowState::WaitingFirstReply,
            contexto: contexto.clone(),
        };

        // The store enforces at-most-one-active-session; losing the
        // creation race means another start already opened the funnel.
        let session = match self.store.create_session(new_session.clone()).await {
            Ok(session) => session,
            Err(StoreError::Constraint(_)) => {
                debug!(lead_id = %lead_id, "lost session-creation race");
                match self.store.get_active_session(lead_id).await? {
                    Some(existing) => {
                        return Ok(StartOutcome {
                            ok: true,
                            session_id: existing.id,
                            opening_message: None,
                            error: None,
                        });
                    }
                    // The winner already closed its session; take the slot.
                    None => self.store.create_session(new_session).await?,
                }
            }
            Err(e) => return Err(e.into()),
        };

        let opening =
            render::opening(&self.config, &origin_channel, custom_opening, &contexto.first_name);
        let mut metadata = serde_json::json!({
            "abertura": true,
            "canal": origin_channel.to_string(),
        });
        if let Some(extra) = extra_context {
            metadata["contexto_extra"] = extra;
        }

        let receipt = self
            .delivery
            .send(lead_id, phone, &opening, Some(session.id), Some(metadata))
            .await?;

        self.store
            .update_lead(
                lead_id,
                LeadUpdate {
                    status: Some(LeadStatus::EmQualificacao),
                    ..Default::default()
                },
            )
            .await?;

        if receipt.ok {
            info!(lead_id = %lead_id, session_id = %session.id, "qualification started");
        } else {
            warn!(
                lead_id = %lead_id,
                session_id = %session.id,
                error = receipt.error.as_deref().unwrap_or("-"),
                "opening message not delivered; session kept for retry"
            );
        }
        Ok(StartOutcome {
            ok: receipt.ok,
            session_id: session.id,
            opening_message: Some(opening),
            error: receipt.error,
        })
    }

    /// Process one inbound message from a lead.
    ///
    /// Self-healing: when no active session exists (first contact, or the
    /// previous run was finalized) a fresh one is started before the
    /// message is processed.
    pub async fn handle_inbound(
        &self,
        lead_id: Uuid,
        phone: &str,
        text: &str,
        name: Option<&str>,
    ) -> Result<InboundOutcome> {
        let session = match self.store.get_active_session(lead_id).await? {
            Some(session) => session,
            None => {
                info!(lead_id = %lead_id, "no active session, self-healing via start");
                let started = self
                    .start(lead_id, phone, name, OriginChannel::WhatsApp, None, None)
                    .await?;
                self.store
                    .get_active_session(lead_id)
                    .await?
                    .ok_or(StoreError::NotFound {
                        entity: "session".to_string(),
                        id: started.session_id.to_string(),
                    })?
            }
        };

        self.store
            .create_message(NewMessage {
                session_id: Some(session.id),
                lead_id,
                conteudo: text.to_string(),
                tipo: MessageDirection::Recebida,
                metadata: serde_json::json!({}),
            })
            .await?;

        let mut contexto = session.contexto.clone();
        let result = self.flow.next_step(session.estado, &mut contexto, text);
        let reply = self.render_reply(&result, &contexto);

        let mut reply_sent = false;
        if let Some(reply_text) = &reply {
            let receipt = self
                .delivery
                .send(lead_id, phone, reply_text, Some(session.id), None)
                .await?;
            reply_sent = receipt.ok;
        }

        self.store
            .update_session(
                session.id,
                SessionUpdate {
                    estado: Some(result.next_state),
                    contexto: Some(contexto.clone()),
                    ativa: result.finalize_session.then_some(false),
                },
            )
            .await?;

        if let Some(status) = result.lead_status {
            self.propagate_lead_status(lead_id, &session, &contexto, status)
                .await?;
        }

        if !result.notes.is_empty() {
            self.upsert_qualification(lead_id, &session, &contexto, &result.notes)
                .await?;
        }

        info!(
            lead_id = %lead_id,
            session_id = %session.id,
            new_state = %result.next_state,
            reply_sent,
            finalized = result.finalize_session,
            "inbound message processed"
        );
        Ok(InboundOutcome {
            ok: true,
            session_id: session.id,
            new_state: result.next_state,
            reply_sent,
            finalized: result.finalize_session,
        })
    }

    /// Phone-keyed entry point for webhook handlers: canonicalizes the
    /// phone and resolves (or creates) the lead before processing.
    pub async fn handle_inbound_from_phone(
        &self,
        raw_phone: &str,
        text: &str,
        name: Option<&str>,
    ) -> Result<InboundOutcome> {
        let phone = self.transport.normalize_phone(raw_phone)?;
        let lead = match self.store.get_lead_by_phone(&phone).await? {
            Some(lead) => lead,
            None => {
                let nome = name
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or(FALLBACK_LEAD_NAME);
                info!(telefone = %phone, nome, "creating lead from inbound message");
                self.store
                    .create_lead(NewLead {
                        nome: nome.to_string(),
                        telefone: phone.clone(),
                        canal: OriginChannel::WhatsApp,
                    })
                    .await?
            }
        };
        self.handle_inbound(lead.id, &phone, text, name).await
    }

    /// Swap in dynamic content the pure engine cannot know: bookable
    /// slots for the meeting offer and scheduling prompt, and the
    /// confirmation echoing the chosen slot.
    fn render_reply(&self, result: &FlowResult, contexto: &FlowContext) -> Option<String> {
        let raw = result.reply.as_ref()?;
        let slots = &self.config.meeting_slots;
        let rendered = match (result.next_state, result.lead_status) {
            (FlowState::OfferMeeting, Some(LeadStatus::Qualificado)) => {
                render::meeting_offer(&contexto.first_name, slots)
            }
            (FlowState::OfferMeeting, None) => render::meeting_reoffer(slots),
            (FlowState::Scheduling, _) if !result.finalize_session => {
                render::scheduling_prompt(slots)
            }
            (_, Some(LeadStatus::ReuniaoAgendada)) => render::meeting_confirmation(
                contexto.meeting_preference.as_deref().unwrap_or(""),
                self.config.booking_link.as_deref(),
            ),
            _ => raw.clone(),
        };
        Some(rendered)
    }

    async fn propagate_lead_status(
        &self,
        lead_id: Uuid,
        session: &Session,
        contexto: &FlowContext,
        status: LeadStatus,
    ) -> Result<()> {
        self.store
            .update_lead(
                lead_id,
                LeadUpdate {
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;

        match status {
            LeadStatus::Qualificado => self.metrics.record_qualification_completed(true),
            LeadStatus::NaoQualificado => self.metrics.record_qualification_completed(false),
            LeadStatus::ReuniaoAgendada => {
                let preferencia = contexto
                    .meeting_preference
                    .clone()
                    .unwrap_or_else(|| "sem preferência".to_string());
                self.store
                    .create_meeting(NewMeeting {
                        lead_id,
                        session_id: session.id,
                        preferencia: preferencia.clone(),
                        booking_link: self.config.booking_link.clone(),
                    })
                    .await?;
                self.metrics.record_meeting_scheduled();
                info!(lead_id = %lead_id, preferencia = %preferencia, "meeting registered");
            }
            _ => {}
        }
        Ok(())
    }

    /// Create or merge the lead's qualification record with the answers
    /// collected so far.
    async fn upsert_qualification(
        &self,
        lead_id: Uuid,
        session: &Session,
        contexto: &FlowContext,
        notes: &indexmap::IndexMap<QuestionKey, String>,
    ) -> Result<()> {
        match self.store.get_qualification(lead_id).await? {
            Some(existing) => {
                let mut merged = existing.respostas.clone();
                for (key, value) in notes {
                    merged.insert(*key, value.clone());
                }
                self.store
                    .update_qualification(
                        existing.id,
                        QualificationUpdate {
                            respostas: Some(merged),
                            resultado: Some(contexto.qualified),
                        },
                    )
                    .await?;
            }
            None => {
                self.store
                    .create_qualification(NewQualification {
                        lead_id,
                        session_id: session.id,
                        respostas: notes.clone(),
                        resultado: contexto.qualified,
                    })
                    .await?;
            }
        }
        Ok(())
    }
}
