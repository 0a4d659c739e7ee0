//! The only component that mutates [`ConversationState`].
//!
//! Each turn is routed on the classified intent. Handlers report internal
//! faults as [`DomainError`]; [`TurnExecutor::execute`] turns those into a
//! recovery reply so a turn always answers.

use std::sync::Arc;

use ration_core::domain::cart::{round_quantity, Item};
use ration_core::domain::conversation::ConversationState;
use ration_core::domain::order::{Order, OrderId};
use ration_core::domain::slots::{PendingItem, Slot};
use ration_core::errors::DomainError;
use ration_core::flows::Phase;
use ration_core::parser::ItemParser;
use ration_db::OrderRepository;
use tracing::{debug, error, info, warn};

use crate::classifier::{Intent, IntentResult};
use crate::guardrails::{GuardrailDecision, GuardrailPolicy, QuotaCheck};
use crate::llm::ResponseGenerator;

pub const RECOVERY_MESSAGE: &str =
    "Something went wrong. Let's start over. What would you like to add?";

const NAME_PROMPTS: [&str; 3] = [
    "Which item would you like to add?",
    "What item did you have in mind?",
    "Could you tell me the item name? For example, rice, dal, or sugar.",
];

const UNIT_PROMPTS: [&str; 3] = [
    "In what unit? For example: kg, gram, litre, or packet.",
    "Should that be in kg, grams, litres, or packets?",
    "Please specify the unit: kg, gram, litre, packet, or piece.",
];

/// Outcome of one executed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnReply {
    Say(String),
    EndSession,
}

impl TurnReply {
    fn say(text: impl Into<String>) -> Self {
        Self::Say(text.into())
    }
}

pub struct TurnExecutor {
    parser: ItemParser,
    guardrails: GuardrailPolicy,
    responder: Arc<dyn ResponseGenerator>,
    orders: Arc<dyn OrderRepository>,
}

impl TurnExecutor {
    pub fn new(
        parser: ItemParser,
        guardrails: GuardrailPolicy,
        responder: Arc<dyn ResponseGenerator>,
        orders: Arc<dyn OrderRepository>,
    ) -> Self {
        Self { parser, guardrails, responder, orders }
    }

    /// Applies `intent` to `state` and produces the reply.
    pub async fn execute(&self, intent: &IntentResult, state: &mut ConversationState) -> TurnReply {
        state.turn_count = state.turn_count.saturating_add(1);
        if intent.spends_llm_budget() {
            state.llm_call_count = state.llm_call_count.saturating_add(1);
        }

        let phase_before = state.phase();
        match self.dispatch(intent, state).await {
            Ok(reply) => {
                debug!(
                    event_name = "agent.turn.executed",
                    session_id = %state.session_id,
                    intent = %intent.intent,
                    from = %phase_before,
                    to = %state.phase(),
                    "turn executed"
                );
                reply
            }
            Err(fault) => {
                error!(
                    event_name = "agent.turn.fault",
                    session_id = %state.session_id,
                    intent = %intent.intent,
                    phase = %phase_before,
                    error = %fault,
                    "turn handler fault, resetting pending item"
                );
                state.slot_buffer.clear();
                state.force_transition(Phase::Idle);
                TurnReply::say(RECOVERY_MESSAGE)
            }
        }
    }

    async fn dispatch(
        &self,
        intent: &IntentResult,
        state: &mut ConversationState,
    ) -> Result<TurnReply, DomainError> {
        let text = intent.raw_text.as_str();

        match intent.intent {
            Intent::UserConfirmed => self.handle_confirmed(state).await,
            Intent::UserDenied => Ok(handle_denied(state)),
            Intent::ConfirmationUnclear => Ok(self.handle_unclear(text, state).await),
            Intent::SlotResponse => self.handle_slot_response(text, state),
            Intent::AddItem => self.handle_add_item(text, state, false),
            Intent::UpdateItem => self.handle_add_item(text, state, true),
            Intent::RemoveItem => Ok(self.handle_remove_item(text, state)),
            Intent::ShowCart => Ok(TurnReply::say(format_cart(state))),
            Intent::ConfirmOrder => Ok(self.handle_confirm_order(text, state).await),
            Intent::Greeting => Ok(self
                .respond(
                    text,
                    state,
                    "Greet them warmly and ask what they'd like to order.",
                    "Hello! What would you like to order today?",
                )
                .await),
            Intent::Acknowledgement => Ok(self.handle_acknowledgement(text, state).await),
            Intent::Clarify => Ok(self
                .respond(
                    text,
                    state,
                    "You didn't understand. Politely ask them to clarify or suggest they say something like 'add 5 kg rice'.",
                    "Sorry, I didn't quite catch that. You can say something like 'add 5 kg rice'.",
                )
                .await),
            Intent::Exit => Ok(TurnReply::EndSession),
        }
    }

    fn handle_add_item(
        &self,
        text: &str,
        state: &mut ConversationState,
        is_update: bool,
    ) -> Result<TurnReply, DomainError> {
        let clause = first_clause(text);
        let parsed = self.parser.parse(clause);

        let targets_existing =
            parsed.name.as_deref().is_some_and(|name| state.items.find(name).is_some());
        if !targets_existing {
            if let GuardrailDecision::Deny { reason_code, user_message, fallback_path } =
                self.guardrails.evaluate(&QuotaCheck::CartCapacity { items: state.items.len() })
            {
                info!(
                    event_name = "agent.guardrail.denied",
                    session_id = %state.session_id,
                    reason_code,
                    fallback_path,
                    "add refused"
                );
                return Ok(TurnReply::Say(user_message));
            }
        }

        state.slot_buffer.merge(&parsed);
        if is_update {
            state.slot_buffer.force_update_flag();
        }
        if state.phase() == Phase::Idle {
            state.transition(Phase::SlotFilling)?;
        }

        self.advance_slots(state)
    }

    fn handle_slot_response(
        &self,
        text: &str,
        state: &mut ConversationState,
    ) -> Result<TurnReply, DomainError> {
        let parsed = self.parser.parse(text);
        state.slot_buffer.merge(&parsed);
        self.advance_slots(state)
    }

    fn advance_slots(&self, state: &mut ConversationState) -> Result<TurnReply, DomainError> {
        if state.slot_buffer.is_complete() {
            state.transition(Phase::AwaitingConfirm)?;
            let prompt = state
                .slot_buffer
                .pending_item()
                .map(item_confirmation_prompt)
                .ok_or_else(|| DomainError::InvariantViolation("complete buffer without item".to_string()))?;
            return Ok(TurnReply::Say(prompt));
        }

        Ok(TurnReply::Say(ask_for_missing(state)))
    }

    async fn handle_confirmed(&self, state: &mut ConversationState) -> Result<TurnReply, DomainError> {
        if state.slot_buffer.is_order_confirmation() {
            return self.finalize_order(state).await;
        }

        let Some(pending) = state.slot_buffer.pending_item().cloned() else {
            return Err(DomainError::InvariantViolation("no pending item to confirm".to_string()));
        };
        let Some(item) = pending.to_item() else {
            warn!(
                event_name = "agent.confirm.incomplete_buffer",
                session_id = %state.session_id,
                "confirmation arrived for an incomplete item"
            );
            state.force_transition(Phase::Idle);
            state.slot_buffer.clear();
            return Ok(TurnReply::say(RECOVERY_MESSAGE));
        };

        let message = match state.items.find_mut(&item.name) {
            Some(existing) if pending.is_accumulate => {
                existing.quantity = round_quantity(existing.quantity + item.quantity);
                format!(
                    "Done! Added {} {} more of {}. You now have {} {} total.",
                    item.quantity,
                    item.unit,
                    title_case(&item.name),
                    existing.quantity,
                    existing.unit
                )
            }
            Some(existing) => {
                existing.quantity = item.quantity;
                existing.unit = item.unit;
                format!("Got it, updated {} to {} {}.", title_case(&item.name), item.quantity, item.unit)
            }
            None => {
                if let GuardrailDecision::Deny { user_message, .. } =
                    self.guardrails.evaluate(&QuotaCheck::CartCapacity { items: state.items.len() })
                {
                    state.slot_buffer.clear();
                    state.force_transition(Phase::Idle);
                    return Ok(TurnReply::Say(user_message));
                }
                let message = format!(
                    "Perfect! {} {} of {} added to your cart.",
                    item.quantity,
                    item.unit,
                    title_case(&item.name)
                );
                state.items.upsert(item);
                message
            }
        };

        state.transition(Phase::Confirmed)?;
        state.slot_buffer.clear();
        state.transition(Phase::Idle)?;
        Ok(TurnReply::Say(message))
    }

    async fn finalize_order(&self, state: &mut ConversationState) -> Result<TurnReply, DomainError> {
        state.transition(Phase::Confirmed)?;

        let order = Order::from_state(state);
        let order_id = match self.orders.save(order.clone()).await {
            Ok(()) => {
                info!(
                    event_name = "agent.order.placed",
                    session_id = %state.session_id,
                    order_id = %order.order_id,
                    item_count = order.items.len(),
                    "order placed"
                );
                order.order_id.to_string()
            }
            Err(error) => {
                warn!(
                    event_name = "agent.order.persist_failed",
                    session_id = %state.session_id,
                    error = %error,
                    "order could not be persisted"
                );
                format!("{} (not persisted)", OrderId::generate())
            }
        };

        state.items.clear();
        state.slot_buffer.clear();
        state.transition(Phase::Idle)?;

        Ok(TurnReply::Say(format!(
            "Your order has been confirmed!\nOrder ID: {order_id}\nThank you! Is there anything else I can help you with?"
        )))
    }

    async fn handle_unclear(&self, text: &str, state: &ConversationState) -> TurnReply {
        if state.slot_buffer.is_order_confirmation() {
            return self
                .respond(
                    text,
                    state,
                    "Ask them to say yes or no to confirm their full order.",
                    "Please say yes to place your order, or no to cancel.",
                )
                .await;
        }

        let described = state
            .slot_buffer
            .pending_item()
            .and_then(PendingItem::to_item)
            .map(|item| format!("{} {} of {}", item.quantity, item.unit, item.name))
            .unwrap_or_else(|| "this item".to_string());
        let instruction = format!("Ask them to say yes or no to add {described}.");
        let fallback = format!("Should I add {described}? Please say yes or no.");
        self.respond(text, state, &instruction, &fallback).await
    }

    async fn handle_confirm_order(&self, text: &str, state: &mut ConversationState) -> TurnReply {
        if state.items.is_empty() {
            return self
                .respond(
                    text,
                    state,
                    "Their cart is empty. Ask them to add items first.",
                    "Your cart is empty. Please add some items before placing the order.",
                )
                .await;
        }

        state.slot_buffer.begin_order_confirmation();
        state.force_transition(Phase::AwaitingConfirm);
        TurnReply::Say(format!(
            "You want to place this order?\n{}\nSay yes to confirm or no to cancel.",
            state.items.summary()
        ))
    }

    async fn handle_acknowledgement(&self, text: &str, state: &ConversationState) -> TurnReply {
        let count = state.items.len();
        if count == 0 {
            return self
                .respond(
                    text,
                    state,
                    "They acknowledged. Invite them to start ordering.",
                    "What items would you like to order today?",
                )
                .await;
        }

        let instruction = format!(
            "They acknowledged. They have {count} item(s) in cart. Ask if they want to add more or confirm."
        );
        self.respond(
            text,
            state,
            &instruction,
            "Would you like to add anything else, or shall I confirm your order?",
        )
        .await
    }

    fn handle_remove_item(&self, text: &str, state: &mut ConversationState) -> TurnReply {
        let parsed = self.parser.parse(text);
        let Some(name) = parsed.name else {
            return TurnReply::say("Which item would you like to remove?");
        };

        if state.items.remove_named(&name) {
            info!(event_name = "agent.cart.removed", session_id = %state.session_id, item = %name, "item removed");
            TurnReply::Say(format!("Removed {} from your cart.", title_case(&name)))
        } else {
            TurnReply::Say(format!("I couldn't find {name} in your cart."))
        }
    }

    async fn respond(
        &self,
        text: &str,
        state: &ConversationState,
        instruction: &str,
        fallback: &str,
    ) -> TurnReply {
        match self.responder.respond(text, state, instruction).await {
            Ok(reply) if !reply.trim().is_empty() => TurnReply::Say(reply),
            Ok(_) => TurnReply::say(fallback),
            Err(error) => {
                warn!(
                    event_name = "agent.respond.failed",
                    session_id = %state.session_id,
                    error = %error,
                    "response generation failed, using fallback"
                );
                TurnReply::say(fallback)
            }
        }
    }
}

fn handle_denied(state: &mut ConversationState) -> TurnReply {
    let message = if state.slot_buffer.is_order_confirmation() {
        "No problem, order not placed. Your cart is still saved. What would you like to do?"
    } else if state.phase() == Phase::SlotFilling {
        "Sure, dropped that. What else would you like to add?"
    } else {
        "Alright, no changes made. What would you like to do?"
    };

    state.slot_buffer.clear();
    state.force_transition(Phase::Idle);
    TurnReply::say(message)
}

/// Only the first clause of a multi-item utterance is handled per turn.
fn first_clause(text: &str) -> &str {
    text.split_once(" and ").map_or(text, |(head, _)| head).trim()
}

fn item_confirmation_prompt(pending: &PendingItem) -> String {
    let action = if pending.is_update { "update" } else { "add" };
    let more = if pending.is_accumulate { " more" } else { "" };
    format!(
        "Got it, {} {} of {}{more}. Shall I {action} this? Say yes or no.",
        pending.quantity.unwrap_or_default(),
        pending.unit.map(|unit| unit.as_str()).unwrap_or_default(),
        title_case(pending.name.as_deref().unwrap_or_default()),
    )
}

/// Asks for the next missing slot. Phrasing escalates with each repeat ask and
/// stays on the last variant once exhausted.
fn ask_for_missing(state: &mut ConversationState) -> String {
    let Some(slot) = state.slot_buffer.next_missing() else {
        return "Could you clarify your order? Try something like '5 kg rice'.".to_string();
    };
    let attempt = state.slot_buffer.record_ask(slot) as usize;

    match slot {
        Slot::Name => pick(&NAME_PROMPTS, attempt).to_string(),
        Slot::Quantity => {
            let name = state
                .slot_buffer
                .pending_item()
                .and_then(|item| item.name.as_deref())
                .map(title_case)
                .unwrap_or_else(|| "that item".to_string());
            let prompts = [
                format!("How much {name} would you like?"),
                format!("What quantity of {name} do you need?"),
                format!("Please tell me the amount of {name}, for example 5 or 2.5."),
            ];
            pick(&prompts, attempt).to_string()
        }
        Slot::Unit => pick(&UNIT_PROMPTS, attempt).to_string(),
    }
}

fn pick<T: AsRef<str>>(variants: &[T], attempt: usize) -> &str {
    let index = attempt.min(variants.len().saturating_sub(1));
    variants.get(index).map(AsRef::as_ref).unwrap_or_default()
}

fn format_cart(state: &ConversationState) -> String {
    if state.items.is_empty() {
        return "Your cart is empty. You can start by saying something like 'add 5 kg rice'."
            .to_string();
    }

    let mut lines = vec![format!("Here's your cart ({} item(s)):", state.items.len())];
    lines.extend(state.items.items().iter().enumerate().map(|(index, item): (usize, &Item)| {
        format!("  {}. {}: {} {}", index + 1, title_case(&item.name), item.quantity, item.unit)
    }));
    lines.push("\nWould you like to add more or confirm the order?".to_string());
    lines.join("\n")
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use ration_core::config::SessionLimits;
    use ration_core::domain::cart::Item;
    use ration_core::domain::conversation::ConversationState;
    use ration_core::domain::order::{Order, OrderId};
    use ration_core::domain::unit::Unit;
    use ration_core::flows::Phase;
    use ration_core::parser::ItemParser;
    use ration_db::{InMemoryOrderRepository, OrderRepository, RepositoryError};

    use super::{first_clause, title_case, TurnExecutor, TurnReply, RECOVERY_MESSAGE};
    use crate::classifier::{Intent, IntentResult, IntentSource};
    use crate::guardrails::GuardrailPolicy;
    use crate::llm::ResponseGenerator;

    struct FailingResponder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ResponseGenerator for FailingResponder {
        async fn respond(&self, _: &str, _: &ConversationState, _: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("generation offline"))
        }
    }

    struct FailingOrders;

    #[async_trait]
    impl OrderRepository for FailingOrders {
        async fn save(&self, _: Order) -> Result<(), RepositoryError> {
            Err(RepositoryError::Encode("disk full".to_string()))
        }

        async fn find_by_id(&self, _: &OrderId) -> Result<Option<Order>, RepositoryError> {
            Ok(None)
        }
    }

    fn executor_with(limits: SessionLimits, orders: Arc<dyn OrderRepository>) -> TurnExecutor {
        TurnExecutor::new(
            ItemParser::new(limits.max_item_quantity),
            GuardrailPolicy::new(limits),
            Arc::new(FailingResponder { calls: AtomicUsize::new(0) }),
            orders,
        )
    }

    fn executor() -> (TurnExecutor, Arc<InMemoryOrderRepository>) {
        let orders = Arc::new(InMemoryOrderRepository::default());
        (executor_with(SessionLimits::default(), orders.clone()), orders)
    }

    fn rules(intent: Intent, text: &str) -> IntentResult {
        IntentResult::from_rules(intent, text)
    }

    fn say(reply: TurnReply) -> String {
        match reply {
            TurnReply::Say(text) => text,
            TurnReply::EndSession => panic!("expected a spoken reply"),
        }
    }

    #[tokio::test]
    async fn complete_add_then_confirm_commits_one_line() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let prompt = say(executor.execute(&rules(Intent::AddItem, "rice 5 kg"), &mut state).await);
        assert_eq!(prompt, "Got it, 5 kg of Rice. Shall I add this? Say yes or no.");
        assert_eq!(state.phase(), Phase::AwaitingConfirm);

        let reply = say(executor.execute(&rules(Intent::UserConfirmed, "yes"), &mut state).await);
        assert_eq!(reply, "Perfect! 5 kg of Rice added to your cart.");
        assert_eq!(state.phase(), Phase::Idle);
        assert_eq!(state.items.items(), &[Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg }]);
        assert!(state.slot_buffer.is_empty());
        assert_eq!(state.turn_count, 2);
    }

    #[tokio::test]
    async fn missing_slots_escalate_and_then_complete() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let first = say(executor.execute(&rules(Intent::AddItem, "rice"), &mut state).await);
        assert_eq!(first, "How much Rice would you like?");
        assert_eq!(state.phase(), Phase::SlotFilling);

        let second = say(executor.execute(&rules(Intent::SlotResponse, "hmm"), &mut state).await);
        assert_eq!(second, "What quantity of Rice do you need?");
        let third = say(executor.execute(&rules(Intent::SlotResponse, "hmm"), &mut state).await);
        let fourth = say(executor.execute(&rules(Intent::SlotResponse, "hmm"), &mut state).await);
        assert_eq!(third, fourth);
        assert!(third.starts_with("Please tell me the amount of Rice"));

        let unit_ask = say(executor.execute(&rules(Intent::SlotResponse, "5"), &mut state).await);
        assert_eq!(unit_ask, "In what unit? For example: kg, gram, litre, or packet.");

        executor.execute(&rules(Intent::SlotResponse, "kg"), &mut state).await;
        assert_eq!(state.phase(), Phase::AwaitingConfirm);
    }

    #[tokio::test]
    async fn accumulate_sums_and_plain_add_overwrites() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "sugar".to_string(), quantity: 1.2, unit: Unit::Kg });

        executor.execute(&rules(Intent::AddItem, "add 0.35 kg more sugar"), &mut state).await;
        let reply = say(executor.execute(&rules(Intent::UserConfirmed, "yes"), &mut state).await);
        assert_eq!(reply, "Done! Added 0.35 kg more of Sugar. You now have 1.55 kg total.");

        executor.execute(&rules(Intent::UpdateItem, "change sugar to 3 kg"), &mut state).await;
        let reply = say(executor.execute(&rules(Intent::UserConfirmed, "yes"), &mut state).await);
        assert_eq!(reply, "Got it, updated Sugar to 3 kg.");
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items.find("sugar").map(|item| item.quantity), Some(3.0));
    }

    #[tokio::test]
    async fn update_prompt_says_update() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let prompt = say(executor.execute(&rules(Intent::UpdateItem, "change dal to 2 kg"), &mut state).await);

        assert_eq!(prompt, "Got it, 2 kg of Dal. Shall I update this? Say yes or no.");
    }

    #[tokio::test]
    async fn only_the_first_clause_is_parsed() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        executor.execute(&rules(Intent::AddItem, "5 kg rice and 2 litre oil"), &mut state).await;

        let pending = state.slot_buffer.pending_item().cloned().unwrap_or_default();
        assert_eq!(pending.name.as_deref(), Some("rice"));
        assert_eq!(first_clause("a and b and c"), "a");
    }

    #[tokio::test]
    async fn full_cart_refuses_new_lines_without_mutation() {
        let limits = SessionLimits { max_cart_items: 1, ..SessionLimits::default() };
        let executor = executor_with(limits, Arc::new(InMemoryOrderRepository::default()));
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });

        let reply = say(executor.execute(&rules(Intent::AddItem, "2 kg dal"), &mut state).await);

        assert_eq!(reply, "Your cart is full (1 items maximum).");
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.slot_buffer.is_empty());
        assert_eq!(state.items.len(), 1);

        executor.execute(&rules(Intent::UpdateItem, "change rice to 7 kg"), &mut state).await;
        assert_eq!(state.phase(), Phase::AwaitingConfirm);
    }

    #[tokio::test]
    async fn denial_paths_clear_the_buffer_and_return_idle() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        executor.execute(&rules(Intent::AddItem, "rice"), &mut state).await;
        let reply = say(executor.execute(&rules(Intent::UserDenied, "cancel"), &mut state).await);
        assert_eq!(reply, "Sure, dropped that. What else would you like to add?");
        assert_eq!(state.phase(), Phase::Idle);

        executor.execute(&rules(Intent::AddItem, "5 kg rice"), &mut state).await;
        let reply = say(executor.execute(&rules(Intent::UserDenied, "no"), &mut state).await);
        assert_eq!(reply, "Alright, no changes made. What would you like to do?");
        assert!(state.slot_buffer.is_empty());
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn order_confirmation_persists_and_clears_cart() {
        let (executor, orders) = executor();
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });

        let echo = say(executor.execute(&rules(Intent::ConfirmOrder, "confirm order"), &mut state).await);
        assert_eq!(echo, "You want to place this order?\n5 kg rice\nSay yes to confirm or no to cancel.");
        assert_eq!(state.phase(), Phase::AwaitingConfirm);
        assert!(state.slot_buffer.is_order_confirmation());

        let reply = say(executor.execute(&rules(Intent::UserConfirmed, "yes"), &mut state).await);

        let saved = orders.all().await;
        assert_eq!(saved.len(), 1);
        assert!(reply.contains(&format!("Order ID: {}", saved[0].order_id)));
        assert_eq!(saved[0].items.len(), 1);
        assert!(state.items.is_empty());
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn denied_order_keeps_cart() {
        let (executor, orders) = executor();
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "oil".to_string(), quantity: 1.0, unit: Unit::Litre });

        executor.execute(&rules(Intent::ConfirmOrder, "place order"), &mut state).await;
        let reply = say(executor.execute(&rules(Intent::UserDenied, "no"), &mut state).await);

        assert!(reply.starts_with("No problem, order not placed."));
        assert_eq!(state.items.len(), 1);
        assert!(orders.all().await.is_empty());
    }

    #[tokio::test]
    async fn persistence_failure_still_completes_the_order() {
        let executor = executor_with(SessionLimits::default(), Arc::new(FailingOrders));
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });

        executor.execute(&rules(Intent::ConfirmOrder, "confirm"), &mut state).await;
        let reply = say(executor.execute(&rules(Intent::UserConfirmed, "yes"), &mut state).await);

        assert!(reply.contains("(not persisted)"));
        assert!(state.items.is_empty());
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn empty_cart_confirm_order_uses_fallback_and_keeps_phase() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let reply = say(executor.execute(&rules(Intent::ConfirmOrder, "confirm order"), &mut state).await);

        assert_eq!(reply, "Your cart is empty. Please add some items before placing the order.");
        assert_eq!(state.phase(), Phase::Idle);
        assert!(!state.slot_buffer.is_order_confirmation());
    }

    #[tokio::test]
    async fn remove_reports_found_and_missing_items() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });

        let missing = say(executor.execute(&rules(Intent::RemoveItem, "remove dal"), &mut state).await);
        let removed = say(executor.execute(&rules(Intent::RemoveItem, "remove rice"), &mut state).await);
        let vague = say(executor.execute(&rules(Intent::RemoveItem, "remove it"), &mut state).await);

        assert_eq!(missing, "I couldn't find dal in your cart.");
        assert_eq!(removed, "Removed Rice from your cart.");
        assert_eq!(vague, "Which item would you like to remove?");
        assert!(state.items.is_empty());
    }

    #[tokio::test]
    async fn show_cart_renders_lines() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let empty = say(executor.execute(&rules(Intent::ShowCart, "show cart"), &mut state).await);
        assert!(empty.starts_with("Your cart is empty."));

        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });
        state.items.upsert(Item { name: "oil".to_string(), quantity: 1.5, unit: Unit::Litre });
        let listing = say(executor.execute(&rules(Intent::ShowCart, "show cart"), &mut state).await);

        assert_eq!(
            listing,
            "Here's your cart (2 item(s)):\n  1. Rice: 5 kg\n  2. Oil: 1.5 litre\n\nWould you like to add more or confirm the order?"
        );
    }

    #[tokio::test]
    async fn confirming_an_incomplete_buffer_recovers() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");
        executor.execute(&rules(Intent::AddItem, "rice"), &mut state).await;
        state.force_transition(Phase::AwaitingConfirm);

        let reply = say(executor.execute(&rules(Intent::UserConfirmed, "yes"), &mut state).await);

        assert_eq!(reply, RECOVERY_MESSAGE);
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.slot_buffer.is_empty());
    }

    #[tokio::test]
    async fn invalid_transition_becomes_a_recovery_reply() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");
        state.force_transition(Phase::Confirmed);

        let reply = say(executor.execute(&rules(Intent::AddItem, "5 kg rice"), &mut state).await);

        assert_eq!(reply, RECOVERY_MESSAGE);
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn open_ended_intents_fall_back_when_generation_fails() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let greeting = say(executor.execute(&rules(Intent::Greeting, "hi"), &mut state).await);
        let clarify = say(executor.execute(&rules(Intent::Clarify, "blorp"), &mut state).await);

        assert_eq!(greeting, "Hello! What would you like to order today?");
        assert!(clarify.contains("add 5 kg rice"));
    }

    #[tokio::test]
    async fn exit_ends_session_without_touching_state() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");
        state.items.upsert(Item { name: "rice".to_string(), quantity: 5.0, unit: Unit::Kg });

        let reply = executor.execute(&rules(Intent::Exit, "bye"), &mut state).await;

        assert_eq!(reply, TurnReply::EndSession);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.turn_count, 1);
    }

    #[tokio::test]
    async fn only_successful_model_turns_spend_budget() {
        let (executor, _) = executor();
        let mut state = ConversationState::new("s");

        let model = IntentResult { intent: Intent::ShowCart, raw_text: "x".to_string(), source: IntentSource::Model };
        let failed = IntentResult { intent: Intent::Clarify, raw_text: "x".to_string(), source: IntentSource::ModelFailed };
        executor.execute(&model, &mut state).await;
        executor.execute(&failed, &mut state).await;

        assert_eq!(state.llm_call_count, 1);
        assert_eq!(state.turn_count, 2);
    }

    #[test]
    fn title_case_capitalizes_each_word() {
        assert_eq!(title_case("rice"), "Rice");
        assert_eq!(title_case("basmati rice"), "Basmati Rice");
    }
}
