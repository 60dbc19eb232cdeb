use super::PollStore;
use crate::db::models::{Choice, Poll, Tally};
use crate::error::PollError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// Process-local store with the same contract as the Postgres one.
#[derive(Debug, Default)]
pub struct MemoryPollStore {
    polls: RwLock<HashMap<Uuid, Poll>>,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.polls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.polls.read().is_empty()
    }
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn create(&self, question: &str) -> Result<Poll, PollError> {
        let poll = Poll::new(question);
        self.polls.write().insert(poll.id, poll.clone());
        Ok(poll)
    }

    async fn get(&self, id: Uuid) -> Result<Poll, PollError> {
        self.polls.read().get(&id).cloned().ok_or(PollError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<Poll>, PollError> {
        Ok(self.polls.read().values().cloned().collect())
    }

    async fn apply_increment(&self, id: Uuid, choice: Choice) -> Result<Tally, PollError> {
        // The write guard makes read-modify-write atomic per call.
        let mut polls = self.polls.write();
        let poll = polls.get_mut(&id).ok_or(PollError::NotFound)?;
        match choice {
            Choice::Yes => poll.yes += 1,
            Choice::No => poll.no += 1,
        }
        Ok(poll.tally())
    }

    async fn delete(&self, id: Uuid) -> Result<Poll, PollError> {
        self.polls.write().remove(&id).ok_or(PollError::NotFound)
    }
}
