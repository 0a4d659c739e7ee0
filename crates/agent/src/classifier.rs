//! Phase-scoped intent classification.
//!
//! Local rules are a fixed cascade of vocabulary tests and never touch the
//! network. Only an idle-phase utterance that no rule claims is sent to the
//! language model, and only while the session budget and the rate limiter
//! allow it. Every failure path resolves to [`Intent::Clarify`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ration_core::domain::unit::Unit;
use ration_core::flows::Phase;
use ration_core::vocabulary::{
    TokenSet, ACKNOWLEDGEMENT_WORDS, AFFIRM_WORDS, CONFIRM_ORDER_WORDS, DEAD_END_WORDS,
    DENY_WORDS, EXIT_WORDS, GREETING_WORDS, KNOWN_ITEMS, REMOVE_WORDS, SHOW_CART_WORDS,
    UPDATE_WORDS,
};
use tracing::{debug, info, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy, QuotaCheck};
use crate::llm::IntentModel;
use crate::rate_limit::RateLimiter;

/// Greetings longer than this are treated as something else.
const MAX_GREETING_TOKENS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intent {
    UserConfirmed,
    UserDenied,
    ConfirmationUnclear,
    SlotResponse,
    AddItem,
    UpdateItem,
    RemoveItem,
    ShowCart,
    ConfirmOrder,
    Greeting,
    Acknowledgement,
    Exit,
    Clarify,
}

impl Intent {
    /// Labels the language model may answer with.
    pub const FALLBACK_LABELS: [Intent; 8] = [
        Intent::AddItem,
        Intent::UpdateItem,
        Intent::RemoveItem,
        Intent::ShowCart,
        Intent::ConfirmOrder,
        Intent::Greeting,
        Intent::Exit,
        Intent::Clarify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserConfirmed => "user_confirmed",
            Self::UserDenied => "user_denied",
            Self::ConfirmationUnclear => "confirmation_unclear",
            Self::SlotResponse => "slot_response",
            Self::AddItem => "add_item",
            Self::UpdateItem => "update_item",
            Self::RemoveItem => "remove_item",
            Self::ShowCart => "show_cart",
            Self::ConfirmOrder => "confirm_order",
            Self::Greeting => "greeting",
            Self::Acknowledgement => "acknowledgement",
            Self::Exit => "exit",
            Self::Clarify => "clarify",
        }
    }

    /// Maps a model label onto the fallback set; anything else becomes `Clarify`.
    pub fn from_fallback_label(label: &str) -> Self {
        let label = label.trim();
        Self::FALLBACK_LABELS
            .into_iter()
            .find(|intent| intent.as_str().eq_ignore_ascii_case(label))
            .unwrap_or(Self::Clarify)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced an intent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntentSource {
    Rules,
    Model,
    ModelFailed,
    BudgetExhausted,
    RateLimited,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntentResult {
    pub intent: Intent,
    pub raw_text: String,
    pub source: IntentSource,
}

impl IntentResult {
    pub fn from_rules(intent: Intent, raw_text: impl Into<String>) -> Self {
        Self { intent, raw_text: raw_text.into(), source: IntentSource::Rules }
    }

    /// Whether an outbound model call was made for this turn.
    pub fn llm_used(&self) -> bool {
        matches!(self.source, IntentSource::Model | IntentSource::ModelFailed)
    }

    /// Only a successful model answer spends session budget.
    pub fn spends_llm_budget(&self) -> bool {
        self.source == IntentSource::Model
    }
}

/// Lowercases and strips punctuation so vocabulary tests see bare words.
/// A `.` or `-` that starts a number or sits inside one survives, so signed
/// and decimal quantities reach the parser intact.
pub fn normalize_utterance(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();
    let mut out = String::with_capacity(lowered.len());

    for (index, ch) in chars.iter().copied().enumerate() {
        let keep = match ch {
            '\'' | '\u{2019}' => continue,
            '.' | '-' => {
                let after_word = index > 0 && chars[index - 1].is_alphabetic();
                let digit_after = chars.get(index + 1).is_some_and(char::is_ascii_digit);
                digit_after && !after_word
            }
            '_' => true,
            other => !other.is_ascii_punctuation(),
        };
        out.push(if keep { ch } else { ' ' });
    }

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule cascade for `text` in `phase`. `None` means no rule matched and the
/// utterance is a candidate for model fallback.
pub fn classify_local(text: &str, phase: Phase) -> Option<Intent> {
    let tokens = TokenSet::new(text);

    match phase {
        Phase::AwaitingConfirm => Some(if tokens.intersects(AFFIRM_WORDS) {
            Intent::UserConfirmed
        } else if tokens.intersects(DENY_WORDS) {
            Intent::UserDenied
        } else {
            Intent::ConfirmationUnclear
        }),
        Phase::SlotFilling => Some(if tokens.intersects(EXIT_WORDS) {
            Intent::Exit
        } else if tokens.intersects(DENY_WORDS) {
            Intent::UserDenied
        } else {
            Intent::SlotResponse
        }),
        Phase::Idle | Phase::Confirmed => classify_idle(text, &tokens),
    }
}

fn classify_idle(text: &str, tokens: &TokenSet<'_>) -> Option<Intent> {
    let has_digit = text.chars().any(|c| c.is_ascii_digit());
    let has_known_item = tokens.intersects(KNOWN_ITEMS);

    if tokens.intersects(EXIT_WORDS) {
        return Some(Intent::Exit);
    }
    if tokens.intersects(SHOW_CART_WORDS) {
        return Some(Intent::ShowCart);
    }
    if tokens.intersects(CONFIRM_ORDER_WORDS) {
        return Some(Intent::ConfirmOrder);
    }
    if tokens.intersects(GREETING_WORDS) && tokens.len() <= MAX_GREETING_TOKENS {
        return Some(Intent::Greeting);
    }
    let closes_thread =
        tokens.intersects(ACKNOWLEDGEMENT_WORDS) || tokens.intersects(DEAD_END_WORDS);
    if closes_thread && !has_known_item && !has_digit {
        return Some(Intent::Acknowledgement);
    }
    if tokens.intersects(REMOVE_WORDS) {
        return Some(Intent::RemoveItem);
    }
    if tokens.intersects(UPDATE_WORDS) {
        return Some(Intent::UpdateItem);
    }
    if has_digit {
        return Some(Intent::AddItem);
    }
    if tokens.iter().any(|token| Unit::is_spelling(token)) {
        return Some(Intent::AddItem);
    }
    if has_known_item {
        return Some(Intent::AddItem);
    }
    None
}

pub struct IntentClassifier {
    model: Arc<dyn IntentModel>,
    limiter: Arc<dyn RateLimiter>,
    guardrails: GuardrailPolicy,
    timeout: Duration,
}

impl IntentClassifier {
    pub fn new(
        model: Arc<dyn IntentModel>,
        limiter: Arc<dyn RateLimiter>,
        guardrails: GuardrailPolicy,
        timeout: Duration,
    ) -> Self {
        Self { model, limiter, guardrails, timeout }
    }

    /// Classifies one utterance. Never fails: every fallback problem resolves
    /// to [`Intent::Clarify`] with the matching [`IntentSource`].
    pub async fn classify(
        &self,
        utterance: &str,
        phase: Phase,
        llm_calls_used: u32,
        cart_summary: &str,
    ) -> IntentResult {
        let text = normalize_utterance(utterance);

        if let Some(intent) = classify_local(&text, phase) {
            debug!(event_name = "agent.classify.rule", %phase, intent = %intent, "rule matched");
            return IntentResult::from_rules(intent, text);
        }

        if let GuardrailDecision::Degrade { reason_code, fallback_path }
        | GuardrailDecision::Deny { reason_code, fallback_path, .. } =
            self.guardrails.evaluate(&QuotaCheck::LlmBudget { calls: llm_calls_used })
        {
            warn!(
                event_name = "agent.classify.budget_exhausted",
                reason_code,
                fallback_path,
                llm_calls_used,
                "model fallback skipped"
            );
            return IntentResult { intent: Intent::Clarify, raw_text: text, source: IntentSource::BudgetExhausted };
        }

        if !self.limiter.try_acquire() {
            warn!(event_name = "agent.classify.rate_limited", "model fallback rate limited");
            return IntentResult { intent: Intent::Clarify, raw_text: text, source: IntentSource::RateLimited };
        }

        self.classify_with_model(text, cart_summary).await
    }

    async fn classify_with_model(&self, text: String, cart_summary: &str) -> IntentResult {
        let labels: Vec<&str> = Intent::FALLBACK_LABELS.iter().map(Intent::as_str).collect();
        let call = self.model.classify(&text, cart_summary, &labels);

        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(label)) => {
                let intent = Intent::from_fallback_label(&label);
                info!(
                    event_name = "agent.classify.model",
                    label = %label,
                    intent = %intent,
                    "model classified utterance"
                );
                IntentResult { intent, raw_text: text, source: IntentSource::Model }
            }
            Ok(Err(error)) => {
                warn!(event_name = "agent.classify.model_failed", error = %error, "model fallback failed");
                IntentResult { intent: Intent::Clarify, raw_text: text, source: IntentSource::ModelFailed }
            }
            Err(_) => {
                warn!(
                    event_name = "agent.classify.model_timeout",
                    timeout_ms = self.timeout.as_millis() as u64,
                    "model fallback timed out"
                );
                IntentResult { intent: Intent::Clarify, raw_text: text, source: IntentSource::ModelFailed }
            }
        }
    }
}
