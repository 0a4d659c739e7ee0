use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::cart::Cart;
use crate::domain::slots::SlotBuffer;
use crate::flows::{validate_transition, Phase, PhaseTransitionError, TransitionOutcome};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Complete state of one ordering call. The serialized field names are the
/// persistence contract shared with the session store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    pub session_id: String,
    phase: Phase,
    #[serde(default)]
    pub slot_buffer: SlotBuffer,
    #[serde(default)]
    pub items: Cart,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub llm_call_count: u32,
    #[serde(default)]
    pub turn_count: u32,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            phase: Phase::Idle,
            slot_buffer: SlotBuffer::default(),
            items: Cart::default(),
            history: Vec::new(),
            llm_call_count: 0,
            turn_count: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Validated transition for the normal turn path.
    pub fn transition(&mut self, to: Phase) -> Result<TransitionOutcome, PhaseTransitionError> {
        let outcome = validate_transition(self.phase, to)?;
        self.phase = to;
        Ok(outcome)
    }

    /// Unvalidated transition, reserved for recovery paths that deliberately
    /// short-circuit the table.
    pub fn force_transition(&mut self, to: Phase) -> TransitionOutcome {
        let outcome = TransitionOutcome { from: self.phase, to, forced: true };
        self.phase = to;
        outcome
    }

    pub fn add_history(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.history.push(HistoryEntry { speaker, text: text.into(), timestamp: Utc::now() });
    }

    /// Drops the cart and any pending item and returns to `Idle`. History and
    /// counters are kept.
    pub fn reset(&mut self) {
        self.items.clear();
        self.slot_buffer.clear();
        self.force_transition(Phase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::domain::cart::Item;
    use crate::domain::conversation::{ConversationState, Speaker};
    use crate::domain::unit::Unit;
    use crate::flows::{Phase, PhaseTransitionError};

    #[test]
    fn validated_transition_follows_the_table() {
        let mut state = ConversationState::new("s-1");
        state.transition(Phase::SlotFilling).expect("idle -> slot filling");
        state.transition(Phase::AwaitingConfirm).expect("slot filling -> awaiting confirm");
        state.transition(Phase::Confirmed).expect("awaiting confirm -> confirmed");

        let error = state.transition(Phase::SlotFilling).expect_err("confirmed -> slot filling");
        assert_eq!(
            error,
            PhaseTransitionError::InvalidTransition { from: Phase::Confirmed, to: Phase::SlotFilling }
        );
        assert_eq!(state.phase(), Phase::Confirmed, "failed transition must not move the phase");
    }

    #[test]
    fn forced_transition_bypasses_the_table() {
        let mut state = ConversationState::new("s-2");
        let outcome = state.force_transition(Phase::AwaitingConfirm);
        assert!(outcome.forced);
        assert_eq!(state.phase(), Phase::AwaitingConfirm);
    }

    #[test]
    fn reset_clears_cart_and_buffer_only() {
        let mut state = ConversationState::new("s-3");
        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });
        state.slot_buffer.begin_order_confirmation();
        state.force_transition(Phase::AwaitingConfirm);
        state.add_history(Speaker::User, "confirm order");
        state.turn_count = 4;

        state.reset();

        assert!(state.items.is_empty());
        assert!(state.slot_buffer.is_empty());
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.turn_count, 4);
    }

    #[test]
    fn serialized_document_uses_contract_field_names() {
        let mut state = ConversationState::new("call-42");
        state.items.upsert(Item { name: "dal".to_string(), quantity: 2.0, unit: Unit::Kg });
        state.add_history(Speaker::Agent, "hello");
        state.llm_call_count = 3;
        state.turn_count = 7;

        let value = serde_json::to_value(&state).expect("serialize state");
        assert_eq!(value["sessionId"], json!("call-42"));
        assert_eq!(value["phase"], json!("IDLE"));
        assert_eq!(value["items"][0]["unit"], json!("kg"));
        assert_eq!(value["history"][0]["speaker"], json!("agent"));
        assert!(value["history"][0]["timestamp"].is_string());
        assert_eq!(value["llmCallCount"], json!(3));
        assert_eq!(value["turnCount"], json!(7));
        assert!(value["slotBuffer"].is_object());

        let decoded: ConversationState = serde_json::from_value(value).expect("decode state");
        assert_eq!(decoded, state);
    }

    #[test]
    fn sparse_documents_decode_with_defaults() {
        let decoded: ConversationState =
            serde_json::from_value(json!({ "sessionId": "old", "phase": "SLOT_FILLING" }))
                .expect("decode sparse document");
        assert_eq!(decoded.phase(), Phase::SlotFilling);
        assert!(decoded.items.is_empty());
        assert_eq!(decoded.turn_count, 0);
    }
}
