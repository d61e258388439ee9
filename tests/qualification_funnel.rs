//! End-to-end funnel test: a fresh lead walks from first contact to a
//! scheduled meeting through the public API, with the in-memory store and
//! a scripted transport.

use std::sync::Arc;

use async_trait::async_trait;

use lead_assist::config::{DeliveryConfig, OrchestratorConfig};
use lead_assist::delivery::DeliveryPipeline;
use lead_assist::error::TransportError;
use lead_assist::flow::FlowState;
use lead_assist::metrics::Metrics;
use lead_assist::session::SessionOrchestrator;
use lead_assist::store::{MemoryStore, NewLead, OriginChannel, RecordStore};
use lead_assist::transport::{SendReceipt, TransportGateway};

const PHONE: &str = "5511988887777";

/// Transport double recording every delivered text in order.
struct ScriptedTransport {
    calls: std::sync::Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    fn sent_texts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl TransportGateway for ScriptedTransport {
    fn normalize_phone(&self, raw: &str) -> Result<String, TransportError> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 10 {
            return Err(TransportError::InvalidPhone(raw.to_string()));
        }
        Ok(digits)
    }

    async fn send_text(&self, phone: &str, text: &str) -> Result<SendReceipt, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((phone.to_string(), text.to_string()));
        Ok(SendReceipt {
            message_id: Some(format!("wamid-{}", self.calls.lock().unwrap().len())),
        })
    }
}

struct Harness {
    orchestrator: SessionOrchestrator,
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryStore>,
    metrics: Arc<Metrics>,
}

fn harness(config: OrchestratorConfig) -> Harness {
    let transport = Arc::new(ScriptedTransport::new());
    let store = Arc::new(MemoryStore::new());
    let metrics = Arc::new(Metrics::new());
    let delivery = Arc::new(DeliveryPipeline::new(
        Arc::clone(&transport) as Arc<dyn TransportGateway>,
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::clone(&metrics),
        DeliveryConfig::default(),
    ));
    let orchestrator = SessionOrchestrator::new(
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::clone(&transport) as Arc<dyn TransportGateway>,
        delivery,
        Arc::clone(&metrics),
        config,
    );
    Harness {
        orchestrator,
        transport,
        store,
        metrics,
    }
}

#[tokio::test]
async fn first_contact_to_scheduled_meeting() {
    let config = OrchestratorConfig {
        booking_link: Some("https://agenda.example/ldc".to_string()),
        ..OrchestratorConfig::default()
    };
    let h = harness(config);

    // First message from an unknown number: lead + session are created and
    // both the opening and the first question go out.
    let outcome = h
        .orchestrator
        .handle_inbound_from_phone("+55 (11) 98888-7777", "Oi, baixei o material de vocês", Some("Eduardo"))
        .await
        .unwrap();
    assert_eq!(outcome.new_state, FlowState::AskPatrimony);
    assert!(outcome.reply_sent);

    let lead = h.store.get_lead_by_phone(PHONE).await.unwrap().unwrap();
    assert_eq!(lead.nome, "Eduardo");

    // Walk the funnel to the meeting offer.
    for answer in [
        "Entre 500k e 1 milhão",
        "Uso XP e Avenue",
        "Suporte fraco e rentabilidade abaixo do CDI",
        "Quero diversificar e proteger em dólar",
    ] {
        let step = h
            .orchestrator
            .handle_inbound_from_phone(PHONE, answer, Some("Eduardo"))
            .await
            .unwrap();
        assert!(step.reply_sent);
    }
    let offer = h
        .orchestrator
        .handle_inbound_from_phone(PHONE, "Médio prazo", Some("Eduardo"))
        .await
        .unwrap();
    assert_eq!(offer.new_state, FlowState::OfferMeeting);

    // Accept and choose a slot.
    let accept = h
        .orchestrator
        .handle_inbound_from_phone(PHONE, "Sim, esta semana pode ser", Some("Eduardo"))
        .await
        .unwrap();
    assert_eq!(accept.new_state, FlowState::Scheduling);

    let done = h
        .orchestrator
        .handle_inbound_from_phone(PHONE, "Terça às 10h funciona", Some("Eduardo"))
        .await
        .unwrap();
    assert!(done.finalized);
    assert_eq!(done.new_state, FlowState::Finished);

    // Outbound copy: opening, five questions, offer with slots, scheduling
    // prompt, confirmation with the booking link.
    let texts = h.transport.sent_texts();
    assert_eq!(texts.len(), 9);
    assert!(texts[0].contains("Eduardo"));
    assert!(texts[6].contains("reunião gratuita"));
    assert!(texts[6].contains("terça às 10h ou quinta às 16h"));
    assert!(texts[8].contains("Terça às 10h funciona"));
    assert!(texts[8].contains("https://agenda.example/ldc"));

    // Records: meeting registered, session closed, counters bumped.
    let meetings = h.store.meetings_for_lead(lead.id).await;
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].preferencia, "Terça às 10h funciona");
    assert_eq!(
        meetings[0].booking_link.as_deref(),
        Some("https://agenda.example/ldc")
    );
    assert!(h.store.get_active_session(lead.id).await.unwrap().is_none());

    let snapshot = h.metrics.snapshot();
    assert_eq!(snapshot.sent_ok, 9);
    assert_eq!(snapshot.meetings_scheduled, 1);
    assert_eq!(snapshot.qualifications_approved, 1);

    // Message log pairs every outbound with the session.
    let messages = h.store.messages_for_lead(lead.id).await;
    assert_eq!(messages.len(), 9 + 8); // 9 sent + 8 received
}

#[tokio::test]
async fn redelivered_start_trigger_sends_one_opening() {
    let h = harness(OrchestratorConfig::default());
    let lead = h
        .store
        .create_lead(NewLead {
            nome: "Ana".to_string(),
            telefone: PHONE.to_string(),
            canal: OriginChannel::Spreadsheet,
        })
        .await
        .unwrap();

    // The lead-sheet watcher fires at-least-once; a redelivered trigger
    // must not open a second funnel thread or resend the opening.
    let first = h
        .orchestrator
        .start(lead.id, PHONE, Some("Ana"), OriginChannel::Spreadsheet, None, None)
        .await
        .unwrap();
    let second = h
        .orchestrator
        .start(lead.id, PHONE, Some("Ana"), OriginChannel::Spreadsheet, None, None)
        .await
        .unwrap();

    assert!(first.ok && second.ok);
    assert_eq!(first.session_id, second.session_id);
    assert!(first.opening_message.is_some());
    assert!(second.opening_message.is_none());
    assert_eq!(h.transport.sent_texts().len(), 1);
}
