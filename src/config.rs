//! Configuration types.

use std::collections::HashMap;
use std::time::Duration;

use crate::store::records::OriginChannel;

/// Token replaced by the lead's first name in opening templates.
pub const NAME_TOKEN: &str = "{nome}";

/// Generic opening used when no channel template matches.
pub const DEFAULT_OPENING: &str = "Oi {nome}! Aqui é a LDC Capital, consultoria independente e \
     multibroker. Vi que você baixou nosso material sobre investimentos internacionais e queria \
     entender rapidamente onde está hoje para te direcionar melhor. Tudo bem responder algumas \
     perguntas?";

/// Delivery Pipeline configuration.
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Window within which identical content to one recipient is suppressed.
    pub dedup_ttl: Duration,
    /// Idle time after which an empty recipient lane is evicted.
    pub lane_idle_ttl: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let dedup_ttl = Duration::from_secs(300);
        Self {
            dedup_ttl,
            // Lanes outlive several dedup windows before eviction.
            lane_idle_ttl: dedup_ttl * 10,
        }
    }
}

/// Session Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Human-readable bookable time labels offered for the advisory meeting.
    pub meeting_slots: Vec<String>,
    /// Optional booking link appended to the scheduling confirmation.
    pub booking_link: Option<String>,
    /// Opening message per acquisition channel. Missing channels fall back
    /// to [`DEFAULT_OPENING`].
    pub opening_templates: HashMap<OriginChannel, String>,
}

impl OrchestratorConfig {
    /// Opening template for a channel, or the generic default.
    pub fn opening_template(&self, channel: &OriginChannel) -> &str {
        self.opening_templates
            .get(channel)
            .map(String::as_str)
            .unwrap_or(DEFAULT_OPENING)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let mut opening_templates = HashMap::new();
        opening_templates.insert(
            OriginChannel::YouTube,
            "🎥 Olá {nome}! Vi que você se inscreveu através do nosso canal no YouTube!\n\n\
             Sou o assistente da LDC Capital e estou aqui para te ajudar com um diagnóstico \
             financeiro gratuito. Você tem alguns minutos para responder algumas perguntas \
             rápidas? 😊"
                .to_string(),
        );
        opening_templates.insert(
            OriginChannel::Newsletter,
            "📧 Oi {nome}! Vi que você acessou nossa newsletter!\n\n\
             Sou o assistente da LDC Capital e quero te oferecer um diagnóstico financeiro \
             personalizado e gratuito. São algumas perguntas rápidas que vão me ajudar a \
             entender seu perfil. Topas participar? 💰"
                .to_string(),
        );
        opening_templates.insert(
            OriginChannel::Ebook,
            "📚 Olá {nome}! Vi que você baixou nosso e-book!\n\n\
             Sou o assistente da LDC Capital e quero te ajudar ainda mais. Que tal um \
             diagnóstico financeiro gratuito e personalizado? Vamos começar? 🚀"
                .to_string(),
        );
        opening_templates.insert(
            OriginChannel::MetaAds,
            "🎯 Oi {nome}! Obrigado por se inscrever através da nossa campanha!\n\n\
             Sou o assistente da LDC Capital e quero te oferecer um diagnóstico financeiro \
             completamente gratuito. Você tem alguns minutos? 📈"
                .to_string(),
        );

        Self {
            meeting_slots: vec!["terça às 10h".to_string(), "quinta às 16h".to_string()],
            booking_link: None,
            opening_templates,
        }
    }
}
