pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod parser;
pub mod vocabulary;

pub use config::{AppConfig, SessionLimits};
pub use domain::cart::{Cart, Item};
pub use domain::conversation::{ConversationState, HistoryEntry, Speaker};
pub use domain::order::{Order, OrderId};
pub use domain::slots::{PendingItem, Slot, SlotBuffer};
pub use domain::unit::Unit;
pub use errors::DomainError;
pub use flows::{Phase, PhaseTransitionError, TransitionOutcome};
pub use parser::{Confidence, ItemParser, ParseResult};
