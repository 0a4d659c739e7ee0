pub mod engine;
pub mod states;

pub use engine::{allowed_targets, validate_transition, PhaseTransitionError, TransitionOutcome};
pub use states::Phase;
