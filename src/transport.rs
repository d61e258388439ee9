//! Transport Gateway seam — chat transport I/O, no business logic.
//!
//! Implementations wrap the actual WhatsApp HTTP client and own its retry
//! and backoff policy; from this crate's view a send either succeeds or
//! fails, and identical content is safe to re-submit.

use async_trait::async_trait;

use crate::error::TransportError;

/// Receipt for a successfully delivered message.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    /// Transport-native message id, when the provider returns one.
    pub message_id: Option<String>,
}

/// Outbound chat transport.
#[async_trait]
pub trait TransportGateway: Send + Sync {
    /// Canonicalize a raw phone number (digits only, country code added).
    fn normalize_phone(&self, raw: &str) -> Result<String, TransportError>;

    /// Send a text message. Blocking for the duration of one transport
    /// round-trip; no retry is expected from the caller.
    async fn send_text(&self, phone: &str, text: &str) -> Result<SendReceipt, TransportError>;
}
