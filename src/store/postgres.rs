use super::PollStore;
use crate::db::{self, DbPool};
use crate::db::models::{Choice, Poll, Tally};
use crate::error::PollError;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgPollStore {
    pool: DbPool,
}

impl PgPollStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl PollStore for PgPollStore {
    async fn create(&self, question: &str) -> Result<Poll, PollError> {
        let poll = db::create_poll(&self.pool, question).await?;
        debug!(poll_id = %poll.id, "poll persisted");
        Ok(poll)
    }

    async fn get(&self, id: Uuid) -> Result<Poll, PollError> {
        db::get_poll(&self.pool, id)
            .await?
            .ok_or(PollError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<Poll>, PollError> {
        Ok(db::get_all_polls(&self.pool).await?)
    }

    async fn apply_increment(&self, id: Uuid, choice: Choice) -> Result<Tally, PollError> {
        db::increment_vote(&self.pool, id, choice)
            .await?
            .ok_or(PollError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<Poll, PollError> {
        db::delete_poll(&self.pool, id)
            .await?
            .ok_or(PollError::NotFound)
    }
}
