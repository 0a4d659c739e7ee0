use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::states::Phase;

/// Legal-transition adjacency table. Anything not listed is forbidden.
const TRANSITIONS: &[(Phase, &[Phase])] = &[
    (Phase::Idle, &[Phase::Idle, Phase::SlotFilling]),
    (Phase::SlotFilling, &[Phase::SlotFilling, Phase::AwaitingConfirm, Phase::Idle]),
    (Phase::AwaitingConfirm, &[Phase::Confirmed, Phase::SlotFilling, Phase::Idle]),
    (Phase::Confirmed, &[Phase::Idle]),
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhaseTransitionError {
    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: Phase,
    pub to: Phase,
    pub forced: bool,
}

pub fn allowed_targets(from: Phase) -> &'static [Phase] {
    TRANSITIONS
        .iter()
        .find(|(source, _)| *source == from)
        .map(|(_, targets)| *targets)
        .unwrap_or(&[])
}

pub fn validate_transition(from: Phase, to: Phase) -> Result<TransitionOutcome, PhaseTransitionError> {
    if allowed_targets(from).contains(&to) {
        Ok(TransitionOutcome { from, to, forced: false })
    } else {
        Err(PhaseTransitionError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{allowed_targets, validate_transition, PhaseTransitionError};
    use crate::flows::states::Phase;

    #[test]
    fn table_matches_documented_transitions() {
        assert_eq!(allowed_targets(Phase::Idle), &[Phase::Idle, Phase::SlotFilling]);
        assert_eq!(
            allowed_targets(Phase::SlotFilling),
            &[Phase::SlotFilling, Phase::AwaitingConfirm, Phase::Idle]
        );
        assert_eq!(
            allowed_targets(Phase::AwaitingConfirm),
            &[Phase::Confirmed, Phase::SlotFilling, Phase::Idle]
        );
        assert_eq!(allowed_targets(Phase::Confirmed), &[Phase::Idle]);
    }

    #[test]
    fn every_pair_outside_the_table_is_rejected() {
        for from in Phase::ALL {
            for to in Phase::ALL {
                let result = validate_transition(from, to);
                if allowed_targets(from).contains(&to) {
                    let outcome = result.expect("listed transition should be accepted");
                    assert!(!outcome.forced);
                } else {
                    assert_eq!(result, Err(PhaseTransitionError::InvalidTransition { from, to }));
                }
            }
        }
    }

    #[test]
    fn confirmed_cannot_return_to_slot_filling() {
        let error = validate_transition(Phase::Confirmed, Phase::SlotFilling)
            .expect_err("confirmed only leads back to idle");
        assert_eq!(
            error.to_string(),
            "invalid phase transition from CONFIRMED to SLOT_FILLING"
        );
    }

    #[test]
    fn idle_cannot_jump_to_awaiting_confirm() {
        assert!(validate_transition(Phase::Idle, Phase::AwaitingConfirm).is_err());
    }
}
