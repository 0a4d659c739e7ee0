//! Agent Runtime - intent classification and turn execution
//!
//! This crate turns one caller utterance into one reply for a ration ordering
//! call:
//! - Classifies intent with phase-scoped word rules, falling back to a language
//!   model only when no rule matches
//! - Applies the intent to the conversation (slot filling, cart, order)
//! - Enforces per-session quotas and the outbound rate limit
//!
//! # Architecture
//!
//! Every turn follows the same loop:
//! 1. **Load** (`runtime`) - fetch `ConversationState` from the session store
//! 2. **Classify** (`classifier`) - utterance + phase → `Intent`
//! 3. **Execute** (`executor`) - the only place state is mutated
//! 4. **Save** (`runtime`) - persist, tolerating store failures
//!
//! # Key Types
//!
//! - `AgentRuntime` - per-session turn driver (see `runtime` module)
//! - `LlmClient` - pluggable completion transport (OpenAI, Groq, Ollama)
//! - `GuardrailPolicy` - cart, turn and model-budget caps
//!
//! # Safety Principle
//!
//! The language model only ever picks a label from a closed set or phrases a
//! reply. It never decides quantities, cart contents or order placement.

pub mod classifier;
pub mod executor;
pub mod guardrails;
pub mod llm;
pub mod openai;
pub mod rate_limit;
pub mod runtime;

pub use classifier::{Intent, IntentClassifier, IntentResult, IntentSource};
pub use executor::{TurnExecutor, TurnReply};
pub use guardrails::{GuardrailDecision, GuardrailPolicy, QuotaCheck};
pub use llm::{client_from_config, IntentModel, LlmClient, ResponseGenerator};
pub use rate_limit::{RateLimiter, TokenBucketLimiter, UnlimitedRateLimiter};
pub use runtime::{AgentRuntime, TurnOutcome};
