use std::fmt;

use serde::{Deserialize, Serialize};

/// Macro-state of one ordering conversation.
///
/// `Confirmed` is transient: the executor always moves on to `Idle` within the
/// same turn, so a saved session is never observed in it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    #[default]
    Idle,
    SlotFilling,
    AwaitingConfirm,
    Confirmed,
}

impl Phase {
    pub const ALL: [Phase; 4] =
        [Phase::Idle, Phase::SlotFilling, Phase::AwaitingConfirm, Phase::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::SlotFilling => "SLOT_FILLING",
            Self::AwaitingConfirm => "AWAITING_CONFIRM",
            Self::Confirmed => "CONFIRMED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
