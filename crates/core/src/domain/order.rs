use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cart::Item;
use crate::domain::conversation::ConversationState;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finalized cart, captured at the moment the caller confirmed it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub session_id: String,
    pub items: Vec<Item>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn from_state(state: &ConversationState) -> Self {
        Self {
            order_id: OrderId::generate(),
            session_id: state.session_id.clone(),
            items: state.items.items().to_vec(),
            created_at: Utc::now(),
        }
    }
}
