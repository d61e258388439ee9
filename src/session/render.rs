//! Rendering of the replies whose content the pure flow engine cannot
//! know: opening messages, bookable slots, and the scheduling
//! confirmation.

use crate::config::{NAME_TOKEN, OrchestratorConfig};
use crate::store::records::OriginChannel;

/// Render the opening message: a custom template when the caller provides
/// one (lead-sheet rows can carry their own copy), otherwise the channel's
/// template, with the `{nome}` token substituted.
pub fn opening(
    config: &OrchestratorConfig,
    channel: &OriginChannel,
    custom_template: Option<&str>,
    first_name: &str,
) -> String {
    let template = custom_template.unwrap_or_else(|| config.opening_template(channel));
    template.replace(NAME_TOKEN, first_name)
}

/// Meeting offer for a freshly qualified lead, listing the bookable slots.
pub fn meeting_offer(first_name: &str, slots: &[String]) -> String {
    format!(
        "Entendi, {first_name}. Para ajudar você a estruturar melhor sua estratégia, posso \
         agendar uma reunião gratuita de diagnóstico financeiro com um especialista da LDC \
         Capital. {}",
        slot_question(slots)
    )
}

/// Re-offer after an ambiguous reply, keeping the same slot set visible.
pub fn meeting_reoffer(slots: &[String]) -> String {
    format!("Perfeito. {}", slot_question(slots))
}

/// Prompt sent when the lead accepts the offer and we move to scheduling.
pub fn scheduling_prompt(slots: &[String]) -> String {
    format!("Ótimo! {}", slot_question(slots))
}

/// Confirmation echoing the chosen slot, with the booking link when
/// configured.
pub fn meeting_confirmation(preference: &str, booking_link: Option<&str>) -> String {
    let mut message = format!(
        "Anotei sua preferência ({preference}). Um especialista da LDC Capital vai confirmar \
         o horário com você ainda hoje."
    );
    if let Some(link) = booking_link {
        message.push_str(&format!(
            "\n\nSe preferir, você já pode garantir o horário por aqui: {link}"
        ));
    }
    message
}

fn slot_question(slots: &[String]) -> String {
    if slots.is_empty() {
        "Qual dia e horário funcionam melhor para você?".to_string()
    } else {
        format!("Temos janelas na {}. Alguma delas funciona?", slots.join(" ou "))
    }
}
