use ration_core::config::SessionLimits;

/// A session quota the runtime or executor wants checked before acting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaCheck {
    /// About to start a new cart line while holding `items` lines.
    CartCapacity { items: usize },
    /// About to run another turn after `turns` completed ones.
    TurnLimit { turns: u32 },
    /// About to call the language model after `calls` successful ones.
    LlmBudget { calls: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    /// The action is skipped and the caller takes `fallback_path` instead.
    Degrade { reason_code: &'static str, fallback_path: &'static str },
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GuardrailPolicy {
    pub limits: SessionLimits,
}

impl GuardrailPolicy {
    pub fn new(limits: SessionLimits) -> Self {
        Self { limits }
    }

    pub fn evaluate(&self, check: &QuotaCheck) -> GuardrailDecision {
        match *check {
            QuotaCheck::CartCapacity { items } if items >= self.limits.max_cart_items => {
                GuardrailDecision::Deny {
                    reason_code: "cart_full",
                    user_message: format!(
                        "Your cart is full ({} items maximum).",
                        self.limits.max_cart_items
                    ),
                    fallback_path: "stay_idle",
                }
            }
            QuotaCheck::TurnLimit { turns } if turns >= self.limits.max_turns => {
                GuardrailDecision::Deny {
                    reason_code: "turn_limit_reached",
                    user_message: "We've reached the session limit. Please call again.".to_string(),
                    fallback_path: "end_session",
                }
            }
            QuotaCheck::LlmBudget { calls } if calls >= self.limits.max_llm_calls => {
                GuardrailDecision::Degrade { reason_code: "llm_budget_exhausted", fallback_path: "clarify" }
            }
            QuotaCheck::CartCapacity { .. }
            | QuotaCheck::TurnLimit { .. }
            | QuotaCheck::LlmBudget { .. } => GuardrailDecision::Allow,
        }
    }
}
