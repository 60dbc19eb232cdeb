//! Canonical poll state.
//!
//! Everything above this layer talks to `dyn PollStore`; the Postgres store is
//! used in production and the in-memory store backs tests and embedding.

mod memory;
mod postgres;

pub use memory::MemoryPollStore;
pub use postgres::PgPollStore;

use crate::db::models::{Choice, Poll, Tally};
use crate::error::PollError;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub type SharedStore = Arc<dyn PollStore>;

#[async_trait]
pub trait PollStore: Send + Sync + 'static {
    async fn create(&self, question: &str) -> Result<Poll, PollError>;

    async fn get(&self, id: Uuid) -> Result<Poll, PollError>;

    /// No ordering guarantee.
    async fn list_all(&self) -> Result<Vec<Poll>, PollError>;

    /// Adds exactly one vote and returns the counters after the increment.
    async fn apply_increment(&self, id: Uuid, choice: Choice) -> Result<Tally, PollError>;

    async fn delete(&self, id: Uuid) -> Result<Poll, PollError>;
}
