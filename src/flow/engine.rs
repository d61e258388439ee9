//! The qualification decision tree.
//!
//! `next_step` is a pure function of `(state, context, inbound text)` — no
//! I/O, no clock, no randomness — so a step can be replayed identically for
//! retries and tests. Free-text answers are classified with fixed keyword
//! lists; the engine never errors, unmatched states absorb into Finished.

use indexmap::IndexMap;
use tracing::debug;

use super::context::{FlowContext, FlowResult, QualifiedState, QuestionKey};
use super::state::FlowState;
use crate::store::records::LeadStatus;

/// Tokens that read as dissatisfaction with the lead's current support.
const SUPPORT_PAIN_TOKENS: [&str; 7] =
    ["fraco", "ruim", "poderia", "melhor", "insatis", "sem", "pouco"];

/// Tokens that read as a concrete investment objective.
const OBJECTIVE_TOKENS: [&str; 7] = [
    "renda",
    "aposent",
    "protec",
    "divers",
    "patrim",
    "dolar",
    "internacional",
];

/// Answers at least this long count as an engaged objective even without a
/// keyword hit. Tunable heuristic, not a principled threshold.
const OBJECTIVE_ENGAGEMENT_LEN: usize = 12;

const POSITIVE_TOKENS: [&str; 11] = [
    "sim",
    "claro",
    "vamos",
    "pode ser",
    "topo",
    "ok",
    "perfeito",
    "combinado",
    "esta semana",
    "bora",
    "fechado",
];

const NEGATIVE_TOKENS: [&str; 9] = [
    "nao",
    "não",
    "depois",
    "sem interesse",
    "agora nao",
    "talvez depois",
    "outro momento",
    "prefiro nao",
    "mais pra frente",
];

/// Polarity of a meeting-offer reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Positive,
    Negative,
    Ambiguous,
}

/// Implements the qualification decision tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct QualificationFlow;

impl QualificationFlow {
    pub fn new() -> Self {
        Self
    }

    /// Build the context for a fresh session.
    pub fn initial_context(&self, first_name: Option<&str>) -> FlowContext {
        FlowContext::new(first_name)
    }

    /// Advance the funnel by one inbound message.
    pub fn next_step(
        &self,
        state: FlowState,
        context: &mut FlowContext,
        incoming_message: &str,
    ) -> FlowResult {
        let message = incoming_message.trim();
        debug!(state = %state, incoming = message, "flow step");

        match state {
            FlowState::WaitingFirstReply => {
                context
                    .responses
                    .insert(QuestionKey::PrimeiraInteracao, message.to_string());
                self.ask_patrimony(context)
            }
            FlowState::AskPatrimony => {
                context
                    .responses
                    .insert(QuestionKey::PatrimonioFaixa, message.to_string());
                self.ask_investment_places()
            }
            FlowState::AskInvestmentPlaces => {
                context
                    .responses
                    .insert(QuestionKey::OndeInveste, message.to_string());
                self.ask_support(context)
            }
            FlowState::AskSupport => {
                context
                    .responses
                    .insert(QuestionKey::AvaliacaoSuporte, message.to_string());
                self.ask_objective()
            }
            FlowState::AskObjective => {
                context
                    .responses
                    .insert(QuestionKey::Objetivo, message.to_string());
                self.ask_timeframe()
            }
            FlowState::AskTimeframe => {
                context
                    .responses
                    .insert(QuestionKey::Prazo, message.to_string());
                if self.is_qualified(context) {
                    context.qualified = QualifiedState::Qualified;
                    self.offer_meeting(context)
                } else {
                    context.qualified = QualifiedState::NotQualified;
                    FlowResult {
                        reply: Some(
                            "Obrigado por compartilhar! Pelo que entendi, podemos continuar \
                             com conteúdos sob medida e aviso você quando houver algo muito \
                             aderente."
                                .to_string(),
                        ),
                        next_state: FlowState::Finished,
                        lead_status: Some(LeadStatus::NaoQualificado),
                        notes: context.responses.clone(),
                        finalize_session: true,
                    }
                }
            }
            FlowState::OfferMeeting => match classify_polarity(message) {
                Polarity::Positive => {
                    context.meeting_preference = None;
                    self.ask_scheduling()
                }
                Polarity::Negative => FlowResult {
                    reply: Some(
                        "Sem problemas! Fico à disposição caso mude de ideia.".to_string(),
                    ),
                    next_state: FlowState::NotInterested,
                    lead_status: Some(LeadStatus::NaoInteressado),
                    notes: context.responses.clone(),
                    finalize_session: true,
                },
                // Unclear answer: re-ask and stay put, context untouched.
                Polarity::Ambiguous => FlowResult {
                    reply: Some(
                        "Perfeito. Prefere conversar ainda esta semana ou posso olhar \
                         agenda para a próxima?"
                            .to_string(),
                    ),
                    next_state: FlowState::OfferMeeting,
                    lead_status: None,
                    notes: IndexMap::new(),
                    finalize_session: false,
                },
            },
            FlowState::Scheduling => {
                context.meeting_preference = Some(message.to_string());
                FlowResult {
                    reply: Some(
                        "Anotei sua preferência. Um especialista da LDC Capital vai \
                         confirmar o horário com você ainda hoje."
                            .to_string(),
                    ),
                    next_state: FlowState::Finished,
                    lead_status: Some(LeadStatus::ReuniaoAgendada),
                    notes: context.responses.clone(),
                    finalize_session: true,
                }
            }
            // Terminal (or otherwise unexpected) states absorb silently.
            FlowState::Finished | FlowState::NotInterested => FlowResult {
                reply: None,
                next_state: FlowState::Finished,
                lead_status: None,
                notes: IndexMap::new(),
                finalize_session: true,
            },
        }
    }

    fn ask_patrimony(&self, context: &FlowContext) -> FlowResult {
        let mut greeting = if context.has_real_name() {
            format!("Legal ouvir você, {}. ", context.first_name)
        } else {
            "Perfeito. ".to_string()
        };
        if let Some(first_mention) = context.responses.get(&QuestionKey::PrimeiraInteracao)
            && !first_mention.is_empty()
        {
            greeting.push_str(&format!(
                "Sobre o que comentou (\"{first_mention}\"), quero entender melhor o seu \
                 momento. "
            ));
        }
        FlowResult {
            reply: Some(format!(
                "{greeting}Hoje qual faixa de patrimônio você mantém aplicada? Pode ser em \
                 faixas, tipo até 100 mil, entre 100k e 500k, acima de 500k..."
            )),
            next_state: FlowState::AskPatrimony,
            lead_status: None,
            notes: IndexMap::new(),
            finalize_session: false,
        }
    }

    fn ask_investment_places(&self) -> FlowResult {
        FlowResult {
            reply: Some(
                "Obrigado por compartilhar. Hoje você investe por qual plataforma ou \
                 corretora? Se for XP, BTG, Avenue ou outra instituição, é só me contar."
                    .to_string(),
            ),
            next_state: FlowState::AskInvestmentPlaces,
            lead_status: None,
            notes: IndexMap::new(),
            finalize_session: false,
        }
    }

    fn ask_support(&self, context: &FlowContext) -> FlowResult {
        let prefix = match context.responses.get(&QuestionKey::OndeInveste) {
            Some(venue) if !venue.is_empty() => {
                format!("Pensando na experiência com {venue}, ")
            }
            _ => String::new(),
        };
        FlowResult {
            reply: Some(format!(
                "{prefix}como você avalia o suporte que recebe hoje? Está satisfeito ou \
                 sente que poderia ter um acompanhamento mais próximo, inclusive em \
                 rentabilidade?"
            )),
            next_state: FlowState::AskSupport,
            lead_status: None,
            notes: IndexMap::new(),
            finalize_session: false,
        }
    }

    fn ask_objective(&self) -> FlowResult {
        FlowResult {
            reply: Some(
                "Legal. Qual é o principal objetivo com esses investimentos hoje?".to_string(),
            ),
            next_state: FlowState::AskObjective,
            lead_status: None,
            notes: IndexMap::new(),
            finalize_session: false,
        }
    }

    fn ask_timeframe(&self) -> FlowResult {
        FlowResult {
            reply: Some(
                "Pensando nesse objetivo, em qual prazo gostaria de ver resultados? Curto, \
                 médio ou longo?"
                    .to_string(),
            ),
            next_state: FlowState::AskTimeframe,
            lead_status: None,
            notes: IndexMap::new(),
            finalize_session: false,
        }
    }

    fn offer_meeting(&self, context: &FlowContext) -> FlowResult {
        FlowResult {
            reply: Some(format!(
                "Entendi, {}. Para ajudar você a estruturar melhor sua estratégia, posso \
                 agendar uma reunião gratuita de diagnóstico financeiro com um especialista \
                 da LDC Capital. Prefere esta semana ou na próxima?",
                context.first_name
            )),
            next_state: FlowState::OfferMeeting,
            lead_status: Some(LeadStatus::Qualificado),
            notes: context.responses.clone(),
            finalize_session: false,
        }
    }

    fn ask_scheduling(&self) -> FlowResult {
        // The orchestrator rewrites this with the currently bookable slots.
        FlowResult {
            reply: Some(
                "Ótimo! Vou te passar as janelas disponíveis da agenda. Qual dia e horário \
                 funcionam melhor para você?"
                    .to_string(),
            ),
            next_state: FlowState::Scheduling,
            lead_status: None,
            notes: IndexMap::new(),
            finalize_session: false,
        }
    }

    fn is_qualified(&self, context: &FlowContext) -> bool {
        let support = context
            .responses
            .get(&QuestionKey::AvaliacaoSuporte)
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        let objective = context
            .responses
            .get(&QuestionKey::Objetivo)
            .map(|s| s.to_lowercase())
            .unwrap_or_default();

        let poor_support = SUPPORT_PAIN_TOKENS
            .iter()
            .any(|token| support.contains(token));
        let clear_objective = OBJECTIVE_TOKENS
            .iter()
            .any(|token| objective.contains(token))
            || objective.chars().count() >= OBJECTIVE_ENGAGEMENT_LEN;
        poor_support && clear_objective
    }
}

// Positive tokens win over negative ones ("sim, mas depois" accepts).
fn classify_polarity(message: &str) -> Polarity {
    let lowered = message.to_lowercase();
    if POSITIVE_TOKENS.iter().any(|token| lowered.contains(token)) {
        return Polarity::Positive;
    }
    if NEGATIVE_TOKENS.iter().any(|token| lowered.contains(token)) {
        return Polarity::Negative;
    }
    Polarity::Ambiguous
}
