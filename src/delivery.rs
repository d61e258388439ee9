//! Delivery pipeline — deduplicated, per-recipient ordered outbound sends.
//!
//! One FIFO lane per recipient, created lazily. The first caller to reach
//! an idle lane drains it to empty while holding the lane's drain mutex;
//! concurrent callers enqueue and return immediately. This keeps delivery
//! strictly FIFO per recipient with no dedicated worker task per contact,
//! and no cross-recipient blocking.
//!
//! Duplicate suppression is content-based: identical normalized text to the
//! same phone inside one TTL-sized window is skipped. The window bucket is
//! part of the cache key, so identical content becomes deliverable again in
//! the next window.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::DeliveryConfig;
use crate::error::Result;
use crate::metrics::Metrics;
use crate::store::records::{MessageDirection, NewMessage};
use crate::store::traits::RecordStore;
use crate::transport::TransportGateway;

/// Why a send was skipped before reaching the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Identical content already sent to this recipient in the window.
    Deduplicated,
    /// Recipient phone failed the plausibility check.
    InvalidPhone,
}

/// Outcome of a [`DeliveryPipeline::send`] call.
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Whether the content is (or already was) on its way to the recipient.
    pub ok: bool,
    /// The message was enqueued behind an active drain; the holder will
    /// deliver it.
    pub queued: bool,
    /// Set when the send was suppressed before queueing.
    pub skipped: Option<SkipReason>,
    /// Transport-native id of the delivered message, when available.
    pub message_id: Option<String>,
    /// Transport failure detail, when `ok` is false.
    pub error: Option<String>,
}

impl DeliveryReceipt {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            ok: false,
            queued: false,
            skipped: Some(reason),
            message_id: None,
            error: None,
        }
    }

    fn queued() -> Self {
        Self {
            ok: true,
            queued: true,
            skipped: None,
            message_id: None,
            error: None,
        }
    }

    fn sent(message_id: Option<String>) -> Self {
        Self {
            ok: true,
            queued: false,
            skipped: None,
            message_id,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            queued: false,
            skipped: None,
            message_id: None,
            error: Some(error),
        }
    }
}

/// One message waiting in a recipient's lane.
#[derive(Debug)]
struct QueuedSend {
    lead_id: Uuid,
    session_id: Option<Uuid>,
    text: String,
    normalized: String,
    metadata: serde_json::Value,
}

/// Per-recipient delivery lane: a FIFO plus the drain mutex that
/// guarantees at most one active sender per recipient.
#[derive(Debug, Default)]
struct Lane {
    queue: Mutex<VecDeque<QueuedSend>>,
    drain: Mutex<()>,
    /// Unix seconds of the last enqueue, for idle eviction.
    last_used: AtomicI64,
}

/// Centralizes outbound sends with dedup and in-order delivery per
/// recipient.
pub struct DeliveryPipeline {
    transport: Arc<dyn TransportGateway>,
    store: Arc<dyn RecordStore>,
    metrics: Arc<Metrics>,
    config: DeliveryConfig,
    dedup: Mutex<HashMap<String, DateTime<Utc>>>,
    lanes: Mutex<HashMap<String, Arc<Lane>>>,
}

impl DeliveryPipeline {
    pub fn new(
        transport: Arc<dyn TransportGateway>,
        store: Arc<dyn RecordStore>,
        metrics: Arc<Metrics>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            transport,
            store,
            metrics,
            config,
            dedup: Mutex::new(HashMap::new()),
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Send `text` to `phone`, suppressing in-window duplicates and
    /// preserving per-recipient order.
    ///
    /// Transport failures are reported in the receipt, not retried here.
    /// Only Record Store failures propagate as errors.
    pub async fn send(
        &self,
        lead_id: Uuid,
        phone: &str,
        text: &str,
        session_id: Option<Uuid>,
        metadata: Option<serde_json::Value>,
    ) -> Result<DeliveryReceipt> {
        if !is_plausible_phone(phone) {
            warn!(telefone = phone, "send blocked: implausible phone number");
            return Ok(DeliveryReceipt::skipped(SkipReason::InvalidPhone));
        }

        self.purge().await;

        let normalized = normalize_body(text);
        let key = self.dedup_key(phone, &normalized);
        if self.dedup.lock().await.contains_key(&key) {
            info!(telefone = phone, dedup_key = %key, "skipping duplicated message");
            self.metrics.record_deduplicated();
            return Ok(DeliveryReceipt::skipped(SkipReason::Deduplicated));
        }

        let lane = {
            let mut lanes = self.lanes.lock().await;
            Arc::clone(lanes.entry(phone.to_string()).or_default())
        };
        lane.last_used.store(Utc::now().timestamp(), Ordering::Relaxed);
        {
            let mut queue = lane.queue.lock().await;
            queue.push_back(QueuedSend {
                lead_id,
                session_id,
                text: text.to_string(),
                normalized,
                metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            });
            debug!(telefone = phone, queue_size = queue.len(), "queued message");
        }

        // Someone is already draining this recipient; they will pick the
        // message up.
        let Ok(_guard) = lane.drain.try_lock() else {
            return Ok(DeliveryReceipt::queued());
        };

        let mut last = DeliveryReceipt::sent(None);
        loop {
            let item = { lane.queue.lock().await.pop_front() };
            let Some(item) = item else { break };

            // An earlier item in this drain may have covered this content.
            let key = self.dedup_key(phone, &item.normalized);
            if self.dedup.lock().await.contains_key(&key) {
                info!(telefone = phone, dedup_key = %key, "skipping duplicate inside queue");
                self.metrics.record_deduplicated();
                continue;
            }

            match self.transport.send_text(phone, &item.text).await {
                Ok(receipt) => {
                    self.dedup.lock().await.insert(key, Utc::now());
                    if item.session_id.is_some() {
                        self.store
                            .create_message(NewMessage {
                                session_id: item.session_id,
                                lead_id: item.lead_id,
                                conteudo: item.text.clone(),
                                tipo: MessageDirection::Enviada,
                                metadata: item.metadata.clone(),
                            })
                            .await?;
                    }
                    self.metrics.record_sent();
                    info!(
                        telefone = phone,
                        message_id = receipt.message_id.as_deref().unwrap_or("-"),
                        "message delivered"
                    );
                    last = DeliveryReceipt::sent(receipt.message_id);
                }
                Err(e) => {
                    self.metrics.record_failed();
                    warn!(telefone = phone, error = %e, "transport send failed");
                    last = DeliveryReceipt::failed(e.to_string());
                }
            }
        }
        Ok(last)
    }

    /// Number of live recipient lanes.
    pub async fn lane_count(&self) -> usize {
        self.lanes.lock().await.len()
    }

    fn dedup_key(&self, phone: &str, normalized: &str) -> String {
        let ttl_secs = self.config.dedup_ttl.as_secs().max(1) as i64;
        let bucket = Utc::now().timestamp().div_euclid(ttl_secs);
        let digest = hex_digest(format!("{phone}|{normalized}").as_bytes());
        format!("{phone}:{bucket}:{digest}")
    }

    /// Drop dedup entries past the TTL and recipient lanes idle long
    /// enough to not be worth keeping. Runs lazily on each send.
    async fn purge(&self) {
        let now = Utc::now();
        {
            let mut dedup = self.dedup.lock().await;
            if !dedup.is_empty() {
                let limit = now - chrono::Duration::seconds(self.config.dedup_ttl.as_secs() as i64);
                dedup.retain(|_, ts| *ts >= limit);
            }
        }

        let idle_secs = self.config.lane_idle_ttl.as_secs() as i64;
        let now_secs = now.timestamp();
        let mut lanes = self.lanes.lock().await;
        lanes.retain(|phone, lane| {
            // Still referenced by an in-flight send.
            if Arc::strong_count(lane) > 1 {
                return true;
            }
            if now_secs - lane.last_used.load(Ordering::Relaxed) < idle_secs {
                return true;
            }
            let Ok(queue) = lane.queue.try_lock() else {
                return true;
            };
            if !queue.is_empty() || lane.drain.try_lock().is_err() {
                return true;
            }
            debug!(telefone = %phone, "evicting idle delivery lane");
            false
        });
    }
}

/// Minimal sanity check before queueing; full validation is the
/// transport's job.
fn is_plausible_phone(phone: &str) -> bool {
    phone.chars().filter(|c| c.is_ascii_digit()).count() >= 10
}

/// Trim, lower-case, and collapse whitespace so cosmetic differences do
/// not defeat deduplication.
fn normalize_body(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn hex_digest(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::error::TransportError;
    use crate::store::MemoryStore;
    use crate::transport::SendReceipt;

    const PHONE: &str = "5511999990000";

    /// Transport that records calls in order; optionally fails every send
    /// or sleeps to keep the drain lock held.
    struct RecordingTransport {
        calls: std::sync::Mutex<Vec<(String, String)>>,
        fail: bool,
        delay: Duration,
    }

    impl RecordingTransport {
        fn new() -> Self {
            Self {
                calls: std::sync::Mutex::new(Vec::new()),
                fail: false,
                delay: Duration::ZERO,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransportGateway for RecordingTransport {
        fn normalize_phone(&self, raw: &str) -> std::result::Result<String, TransportError> {
            Ok(raw.chars().filter(|c| c.is_ascii_digit()).collect())
        }

        async fn send_text(
            &self,
            phone: &str,
            text: &str,
        ) -> std::result::Result<SendReceipt, TransportError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(TransportError::SendFailed {
                    phone: phone.to_string(),
                    reason: "gateway offline".to_string(),
                });
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push((phone.to_string(), text.to_string()));
            Ok(SendReceipt {
                message_id: Some(format!("msg-{}", calls.len())),
            })
        }
    }

    struct Fixture {
        pipeline: Arc<DeliveryPipeline>,
        transport: Arc<RecordingTransport>,
        store: Arc<MemoryStore>,
        metrics: Arc<Metrics>,
        lead_id: Uuid,
        session_id: Uuid,
    }

    fn fixture_with(transport: RecordingTransport, config: DeliveryConfig) -> Fixture {
        let transport = Arc::new(transport);
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(Metrics::new());
        let pipeline = Arc::new(DeliveryPipeline::new(
            Arc::clone(&transport) as Arc<dyn TransportGateway>,
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&metrics),
            config,
        ));
        Fixture {
            pipeline,
            transport,
            store,
            metrics,
            lead_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingTransport::new(), DeliveryConfig::default())
    }

    #[tokio::test]
    async fn duplicate_content_sends_once() {
        let f = fixture();

        let first = f
            .pipeline
            .send(f.lead_id, PHONE, "Olá! Tudo bem?", Some(f.session_id), None)
            .await
            .unwrap();
        assert!(first.ok);
        assert!(first.message_id.is_some());

        // Same content, cosmetic differences only.
        let second = f
            .pipeline
            .send(f.lead_id, PHONE, "  olá!   tudo bem? ", Some(f.session_id), None)
            .await
            .unwrap();
        assert_eq!(second.skipped, Some(SkipReason::Deduplicated));

        assert_eq!(f.transport.calls().len(), 1);
        assert_eq!(f.store.messages_for_lead(f.lead_id).await.len(), 1);
        let snapshot = f.metrics.snapshot();
        assert_eq!(snapshot.sent_ok, 1);
        assert_eq!(snapshot.skip_duplicate, 1);
    }

    #[tokio::test]
    async fn distinct_content_delivers_in_issuance_order() {
        let f = fixture_with(
            RecordingTransport::slow(Duration::from_millis(50)),
            DeliveryConfig::default(),
        );

        // First send grabs the drain lock and sleeps inside the transport.
        let pipeline = Arc::clone(&f.pipeline);
        let lead_id = f.lead_id;
        let holder = tokio::spawn(async move {
            pipeline
                .send(lead_id, PHONE, "mensagem 0", None, None)
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Subsequent sends enqueue behind the holder and return immediately.
        for i in 1..6 {
            let receipt = f
                .pipeline
                .send(f.lead_id, PHONE, &format!("mensagem {i}"), None, None)
                .await
                .unwrap();
            assert!(receipt.queued, "send {i} should have been queued");
        }

        let first = holder.await.unwrap();
        assert!(first.ok);

        let texts: Vec<String> = f.transport.calls().into_iter().map(|(_, t)| t).collect();
        assert_eq!(
            texts,
            (0..6).map(|i| format!("mensagem {i}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn different_recipients_do_not_contend() {
        let f = fixture();

        let receipts = futures::future::join_all((0..4).map(|i| {
            let pipeline = Arc::clone(&f.pipeline);
            let lead_id = f.lead_id;
            async move {
                pipeline
                    .send(lead_id, &format!("551199999000{i}"), "Olá!", None, None)
                    .await
                    .unwrap()
            }
        }))
        .await;

        assert!(receipts.iter().all(|r| r.ok && !r.queued));
        assert_eq!(f.transport.calls().len(), 4);
    }

    #[tokio::test]
    async fn same_content_resends_in_a_later_window() {
        let f = fixture_with(
            RecordingTransport::new(),
            DeliveryConfig {
                dedup_ttl: Duration::from_secs(1),
                lane_idle_ttl: Duration::from_secs(600),
            },
        );

        f.pipeline
            .send(f.lead_id, PHONE, "lembrete", None, None)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let receipt = f
            .pipeline
            .send(f.lead_id, PHONE, "lembrete", None, None)
            .await
            .unwrap();

        assert!(receipt.ok);
        assert!(receipt.skipped.is_none());
        assert_eq!(f.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn implausible_phone_is_rejected_before_queueing() {
        let f = fixture();
        let receipt = f
            .pipeline
            .send(f.lead_id, "119", "Olá!", None, None)
            .await
            .unwrap();
        assert_eq!(receipt.skipped, Some(SkipReason::InvalidPhone));
        assert!(f.transport.calls().is_empty());
        assert_eq!(f.pipeline.lane_count().await, 0);
    }

    #[tokio::test]
    async fn transport_failure_reports_without_retry() {
        let f = fixture_with(RecordingTransport::failing(), DeliveryConfig::default());

        let receipt = f
            .pipeline
            .send(f.lead_id, PHONE, "Olá!", Some(f.session_id), None)
            .await
            .unwrap();
        assert!(!receipt.ok);
        assert!(receipt.error.as_deref().unwrap().contains("gateway offline"));
        // Nothing cached, nothing persisted: the same content is
        // re-sendable once the transport recovers.
        assert!(f.store.messages_for_lead(f.lead_id).await.is_empty());
        assert_eq!(f.metrics.snapshot().failed, 1);

        let again = f
            .pipeline
            .send(f.lead_id, PHONE, "Olá!", Some(f.session_id), None)
            .await
            .unwrap();
        assert!(again.skipped.is_none());
    }

    #[tokio::test]
    async fn idle_lanes_are_evicted() {
        let f = fixture_with(
            RecordingTransport::new(),
            DeliveryConfig {
                dedup_ttl: Duration::from_secs(300),
                lane_idle_ttl: Duration::ZERO,
            },
        );

        f.pipeline
            .send(f.lead_id, PHONE, "primeira", None, None)
            .await
            .unwrap();
        assert_eq!(f.pipeline.lane_count().await, 1);

        // The next send's lazy purge drops the now-idle lane.
        f.pipeline
            .send(f.lead_id, "5511888880000", "segunda", None, None)
            .await
            .unwrap();
        assert_eq!(f.pipeline.lane_count().await, 1);
    }

    #[tokio::test]
    async fn message_without_session_is_not_persisted() {
        let f = fixture();
        f.pipeline
            .send(f.lead_id, PHONE, "aviso avulso", None, None)
            .await
            .unwrap();
        assert_eq!(f.transport.calls().len(), 1);
        assert!(f.store.messages_for_lead(f.lead_id).await.is_empty());
    }

    #[test]
    fn normalize_collapses_whitespace_and_case() {
        assert_eq!(normalize_body("  Olá   MUNDO \n"), "olá mundo");
        assert_eq!(normalize_body(""), "");
    }
}
