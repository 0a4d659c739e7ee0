use thiserror::Error;

use crate::flows::PhaseTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    PhaseTransition(#[from] PhaseTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use crate::errors::DomainError;
    use crate::flows::{Phase, PhaseTransitionError};

    #[test]
    fn transition_fault_passes_through_transparently() {
        let error = DomainError::from(PhaseTransitionError::InvalidTransition {
            from: Phase::Confirmed,
            to: Phase::SlotFilling,
        });

        assert_eq!(error.to_string(), "invalid phase transition from CONFIRMED to SLOT_FILLING");
    }

    #[test]
    fn invariant_violations_name_the_broken_rule() {
        let error = DomainError::InvariantViolation("confirmed an incomplete buffer".to_owned());
        assert_eq!(error.to_string(), "domain invariant violation: confirmed an incomplete buffer");
    }
}
