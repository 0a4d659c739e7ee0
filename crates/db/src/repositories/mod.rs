use async_trait::async_trait;
use thiserror::Error;

use ration_core::domain::conversation::ConversationState;
use ration_core::domain::order::{Order, OrderId};

pub mod memory;
pub mod order;
pub mod session;

pub use memory::{InMemoryOrderRepository, InMemorySessionStore};
pub use order::SqlOrderRepository;
pub use session::SqlSessionStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
}

/// Durable home of [`ConversationState`] between turns.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, RepositoryError>;
    async fn save(&self, state: &ConversationState) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: Order) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
}
