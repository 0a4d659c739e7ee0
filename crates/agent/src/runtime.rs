use std::sync::Arc;
use std::time::Duration;

use ration_core::config::AppConfig;
use ration_core::domain::conversation::{ConversationState, Speaker};
use ration_core::parser::ItemParser;
use ration_db::{OrderRepository, RepositoryError, SessionStore};
use tracing::{info, warn};

use crate::classifier::IntentClassifier;
use crate::executor::{TurnExecutor, TurnReply};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy, QuotaCheck};
use crate::llm::{LlmClient, LlmIntentModel, LlmResponseGenerator};
use crate::rate_limit::TokenBucketLimiter;

pub const FAREWELL_MESSAGE: &str = "Thank you for calling. Goodbye!";
pub const BLANK_UTTERANCE_PROMPT: &str = "Sorry, I didn't hear anything. What would you like to order?";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Reply(String),
    SessionEnded,
    TurnLimitReached(String),
}

/// Drives turns for any number of sessions. Each turn loads the session,
/// classifies, executes and saves; turns on one session must be serialized by
/// the caller.
pub struct AgentRuntime {
    sessions: Arc<dyn SessionStore>,
    classifier: IntentClassifier,
    executor: TurnExecutor,
    guardrails: GuardrailPolicy,
}

impl AgentRuntime {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        classifier: IntentClassifier,
        executor: TurnExecutor,
        guardrails: GuardrailPolicy,
    ) -> Self {
        Self { sessions, classifier, executor, guardrails }
    }

    /// Wires the production collaborators from configuration around one model
    /// client.
    pub fn from_config(
        config: &AppConfig,
        sessions: Arc<dyn SessionStore>,
        orders: Arc<dyn OrderRepository>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let guardrails = GuardrailPolicy::new(config.session);
        let classifier = IntentClassifier::new(
            Arc::new(LlmIntentModel::new(llm.clone())),
            Arc::new(TokenBucketLimiter::from_config("llm_fallback", &config.rate_limit)),
            guardrails,
            Duration::from_secs(config.llm.timeout_secs),
        );
        let executor = TurnExecutor::new(
            ItemParser::new(config.session.max_item_quantity),
            guardrails,
            Arc::new(LlmResponseGenerator::new(llm)),
            orders,
        );

        Self::new(sessions, classifier, executor, guardrails)
    }

    /// Starts `session_id` from a clean slate, replacing anything stored under it.
    pub async fn start_session(&self, session_id: &str) -> ConversationState {
        let state = ConversationState::new(session_id);
        self.persist(&state).await;
        info!(event_name = "agent.session.started", session_id, "session started");
        state
    }

    /// Clears the cart and any pending item and returns the session to idle.
    pub async fn end_session(&self, session_id: &str) -> Result<(), RepositoryError> {
        let mut state = self.load_or_create(session_id).await;
        state.reset();
        self.sessions.save(&state).await?;
        info!(event_name = "agent.session.ended", session_id, turns = state.turn_count, "session ended");
        Ok(())
    }

    pub async fn handle_utterance(&self, session_id: &str, utterance: &str) -> TurnOutcome {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return TurnOutcome::Reply(BLANK_UTTERANCE_PROMPT.to_string());
        }

        let mut state = self.load_or_create(session_id).await;

        if let GuardrailDecision::Deny { reason_code, user_message, fallback_path } =
            self.guardrails.evaluate(&QuotaCheck::TurnLimit { turns: state.turn_count })
        {
            warn!(
                event_name = "agent.turn.limit_reached",
                session_id,
                reason_code,
                fallback_path,
                turns = state.turn_count,
                "turn cap reached"
            );
            return TurnOutcome::TurnLimitReached(user_message);
        }

        state.add_history(Speaker::User, utterance);
        let cart_summary = state.items.summary();
        let intent = self
            .classifier
            .classify(utterance, state.phase(), state.llm_call_count, &cart_summary)
            .await;

        match self.executor.execute(&intent, &mut state).await {
            TurnReply::Say(reply) => {
                state.add_history(Speaker::Agent, reply.as_str());
                self.persist(&state).await;
                info!(
                    event_name = "agent.turn.completed",
                    session_id,
                    intent = %intent.intent,
                    phase = %state.phase(),
                    turn = state.turn_count,
                    cart_items = state.items.len(),
                    "turn completed"
                );
                TurnOutcome::Reply(reply)
            }
            TurnReply::EndSession => {
                state.add_history(Speaker::Agent, FAREWELL_MESSAGE);
                state.reset();
                self.persist(&state).await;
                info!(event_name = "agent.session.ended", session_id, turns = state.turn_count, "caller ended session");
                TurnOutcome::SessionEnded
            }
        }
    }

    async fn load_or_create(&self, session_id: &str) -> ConversationState {
        match self.sessions.load(session_id).await {
            Ok(Some(state)) => state,
            Ok(None) => ConversationState::new(session_id),
            Err(error) => {
                warn!(
                    event_name = "agent.session.load_failed",
                    session_id,
                    error = %error,
                    "session load failed, starting fresh"
                );
                ConversationState::new(session_id)
            }
        }
    }

    async fn persist(&self, state: &ConversationState) {
        if let Err(error) = self.sessions.save(state).await {
            warn!(
                event_name = "agent.session.save_failed",
                session_id = %state.session_id,
                error = %error,
                "session save failed"
            );
        }
    }
}
