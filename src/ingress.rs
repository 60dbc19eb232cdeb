//! Entry point for everything that changes poll state.
//!
//! Socket votes are decoded here and routed to the owning aggregator. Poll
//! creation and deletion also go through here so the registry and the live
//! clients stay in step with the store.

use crate::broadcast::{BroadcastEvent, BroadcastHub};
use crate::db::models::{Choice, Poll, VoteEvent};
use crate::error::PollError;
use crate::registry::PollRegistry;
use crate::store::SharedStore;
use serde::Deserialize;
use std::fmt;
use uuid::Uuid;

pub const MAX_QUESTION_LEN: usize = 500;

/// Body of an inbound vote: `{ "id": "<poll id>", "answer": 0 | 1 }`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VoteMessage {
    pub id: Uuid,
    pub answer: Choice,
}

impl From<VoteMessage> for VoteEvent {
    fn from(msg: VoteMessage) -> Self {
        VoteEvent {
            poll_id: msg.id,
            choice: msg.answer,
        }
    }
}

/// Messages a socket client may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    #[serde(rename = "answer:input")]
    Vote(VoteMessage),
}

#[derive(Clone)]
pub struct IngressAdapter {
    store: SharedStore,
    registry: PollRegistry,
    hub: BroadcastHub,
}

impl fmt::Debug for IngressAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngressAdapter")
            .field("registry", &self.registry)
            .field("hub", &self.hub)
            .finish()
    }
}

impl IngressAdapter {
    pub fn new(store: SharedStore, registry: PollRegistry, hub: BroadcastHub) -> Self {
        Self {
            store,
            registry,
            hub,
        }
    }

    pub fn decode(raw: &str) -> Result<ClientMessage, PollError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn decode_vote(raw: &str) -> Result<VoteEvent, PollError> {
        match Self::decode(raw)? {
            ClientMessage::Vote(msg) => Ok(msg.into()),
        }
    }

    /// Routes a vote to its poll's aggregator.
    ///
    /// `Ok` means the vote was queued, not that it was applied.
    pub async fn submit_vote(&self, event: VoteEvent) -> Result<(), PollError> {
        let aggregator = match self.registry.get(event.poll_id) {
            Some(aggregator) => aggregator,
            None => {
                self.store.get(event.poll_id).await?;
                let aggregator = self.registry.ensure_aggregator(event.poll_id);

                // A delete landing between the lookup and the insert finds no
                // aggregator to remove, so look again before accepting.
                if let Err(e) = self.store.get(event.poll_id).await {
                    if e == PollError::NotFound {
                        self.registry.discard(&aggregator);
                    }
                    return Err(e);
                }
                aggregator
            }
        };

        aggregator.submit(event.choice).await
    }

    /// Decodes and submits one raw socket message. Every failure is logged
    /// here; the error is returned only so callers can count it.
    pub async fn handle_raw(&self, raw: &str) -> Result<(), PollError> {
        let result = match Self::decode_vote(raw) {
            Ok(event) => {
                debug!(poll_id = %event.poll_id, choice = %event.choice, "vote received");
                self.submit_vote(event).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {}
            Err(PollError::Validation(reason)) => warn!(%reason, "rejecting malformed vote"),
            Err(PollError::NotFound) => warn!("vote for unknown poll dropped"),
            Err(e) => error!(error = %e, "vote could not be queued"),
        }

        result
    }

    pub async fn create_poll(&self, question: &str) -> Result<Poll, PollError> {
        let question = validate_question(question)?;

        let poll = self.store.create(question).await?;
        self.registry.ensure_aggregator(poll.id);
        self.hub.publish(BroadcastEvent::PollCreated(poll.clone()));
        info!(poll_id = %poll.id, "new poll created");

        Ok(poll)
    }

    pub async fn delete_poll(&self, poll_id: Uuid) -> Result<Poll, PollError> {
        let poll = self.store.delete(poll_id).await?;
        self.registry.remove(poll_id);
        self.hub.publish(BroadcastEvent::PollDeleted { id: poll_id });
        info!(%poll_id, "poll deleted");

        Ok(poll)
    }

    pub async fn get_poll(&self, poll_id: Uuid) -> Result<Poll, PollError> {
        self.store.get(poll_id).await
    }

    pub async fn list_polls(&self) -> Result<Vec<Poll>, PollError> {
        self.store.list_all().await
    }

    pub fn registry(&self) -> &PollRegistry {
        &self.registry
    }

    pub fn hub(&self) -> &BroadcastHub {
        &self.hub
    }
}

fn validate_question(question: &str) -> Result<&str, PollError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PollError::Validation("Question is required".into()));
    }
    if question.chars().count() > MAX_QUESTION_LEN {
        return Err(PollError::Validation(format!(
            "Question must be at most {MAX_QUESTION_LEN} characters"
        )));
    }
    Ok(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Tally;
    use crate::store::{MemoryPollStore, PollStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn adapter() -> (IngressAdapter, Arc<MemoryPollStore>) {
        let store = Arc::new(MemoryPollStore::new());
        let hub = BroadcastHub::new(64);
        let registry = PollRegistry::new(store.clone(), hub.clone(), 8);
        (IngressAdapter::new(store.clone(), registry, hub), store)
    }

    #[test]
    fn test_decode_vote_envelope() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"event":"answer:input","data":{{"id":"{id}","answer":1}}}}"#);

        let event = IngressAdapter::decode_vote(&raw).unwrap();
        assert_eq!(event.poll_id, id);
        assert_eq!(event.choice, Choice::Yes);
    }

    #[test]
    fn test_decode_rejects_unknown_answer() {
        let id = Uuid::new_v4();
        for answer in ["2", "-1", "true", "\"yes\""] {
            let raw =
                format!(r#"{{"event":"answer:input","data":{{"id":"{id}","answer":{answer}}}}}"#);
            assert!(matches!(
                IngressAdapter::decode_vote(&raw),
                Err(PollError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_decode_rejects_bad_id_and_unknown_event() {
        let bad_id = r#"{"event":"answer:input","data":{"id":"not-a-uuid","answer":0}}"#;
        let unknown = r#"{"event":"answer:retract","data":{}}"#;

        assert!(matches!(IngressAdapter::decode_vote(bad_id), Err(PollError::Validation(_))));
        assert!(matches!(IngressAdapter::decode_vote(unknown), Err(PollError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_validates_question() {
        let (adapter, store) = adapter();

        assert!(matches!(adapter.create_poll("   ").await, Err(PollError::Validation(_))));
        let long = "x".repeat(MAX_QUESTION_LEN + 1);
        assert!(matches!(adapter.create_poll(&long).await, Err(PollError::Validation(_))));
        assert!(store.is_empty());

        let poll = adapter.create_poll("  Pineapple on pizza?  ").await.unwrap();
        assert_eq!(poll.question, "Pineapple on pizza?");
        assert_eq!(poll.tally(), Tally::new(0, 0));
        assert!(adapter.registry().get(poll.id).is_some());
    }

    #[tokio::test]
    async fn test_vote_for_unknown_poll_is_not_found() {
        let (adapter, _store) = adapter();
        let event = VoteEvent {
            poll_id: Uuid::new_v4(),
            choice: Choice::Yes,
        };

        assert_eq!(adapter.submit_vote(event).await, Err(PollError::NotFound));
        assert!(adapter.registry().is_empty());
    }

    #[tokio::test]
    async fn test_vote_for_preexisting_poll_starts_aggregator() {
        let (adapter, store) = adapter();
        let poll = store.create("Made before startup?").await.unwrap();
        let mut sub = adapter.hub().subscribe();

        adapter
            .submit_vote(VoteEvent {
                poll_id: poll.id,
                choice: Choice::No,
            })
            .await
            .unwrap();

        match sub.recv().await {
            Some(BroadcastEvent::Tally(update)) => assert_eq!(update.tally, Tally::new(0, 1)),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_tears_down_and_notifies() {
        let (adapter, store) = adapter();
        let poll = adapter.create_poll("Short lived?").await.unwrap();
        let mut sub = adapter.hub().subscribe();

        let deleted = adapter.delete_poll(poll.id).await.unwrap();

        assert_eq!(deleted.id, poll.id);
        assert!(adapter.registry().get(poll.id).is_none());
        assert_eq!(store.get(poll.id).await, Err(PollError::NotFound));
        assert_eq!(sub.recv().await, Some(BroadcastEvent::PollDeleted { id: poll.id }));
        assert_eq!(adapter.delete_poll(poll.id).await, Err(PollError::NotFound));
    }

    #[tokio::test]
    async fn test_handle_raw_reports_validation_errors() {
        let (adapter, _store) = adapter();

        assert!(matches!(
            adapter.handle_raw("not json").await,
            Err(PollError::Validation(_))
        ));
    }

    /// Can hold a `get` after it has read the row, until resumed.
    #[derive(Default)]
    struct PausingStore {
        inner: MemoryPollStore,
        pause_next_get: AtomicBool,
        paused: Notify,
        resume: Notify,
    }

    #[async_trait]
    impl PollStore for PausingStore {
        async fn create(&self, question: &str) -> Result<Poll, PollError> {
            self.inner.create(question).await
        }

        async fn get(&self, id: Uuid) -> Result<Poll, PollError> {
            let poll = self.inner.get(id).await;
            if self.pause_next_get.swap(false, Ordering::SeqCst) {
                self.paused.notify_one();
                self.resume.notified().await;
            }
            poll
        }

        async fn list_all(&self) -> Result<Vec<Poll>, PollError> {
            self.inner.list_all().await
        }

        async fn apply_increment(&self, id: Uuid, choice: Choice) -> Result<Tally, PollError> {
            self.inner.apply_increment(id, choice).await
        }

        async fn delete(&self, id: Uuid) -> Result<Poll, PollError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn test_vote_racing_delete_is_not_found_and_leaves_nothing() {
        let store = Arc::new(PausingStore::default());
        let hub = BroadcastHub::new(64);
        let registry = PollRegistry::new(store.clone(), hub.clone(), 8);
        let adapter = IngressAdapter::new(store.clone(), registry, hub);
        // Created behind the adapter's back, so no aggregator exists yet.
        let poll = store.create("Racing a delete?").await.unwrap();
        let mut sub = adapter.hub().subscribe();

        store.pause_next_get.store(true, Ordering::SeqCst);
        let voter = adapter.clone();
        let vote = tokio::spawn(async move {
            voter
                .submit_vote(VoteEvent {
                    poll_id: poll.id,
                    choice: Choice::Yes,
                })
                .await
        });

        store.paused.notified().await;
        adapter.delete_poll(poll.id).await.unwrap();
        store.resume.notify_one();

        assert_eq!(vote.await.unwrap(), Err(PollError::NotFound));
        assert!(adapter.registry().is_empty());
        assert_eq!(sub.recv().await, Some(BroadcastEvent::PollDeleted { id: poll.id }));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sub.try_recv().is_none());
    }
}
