use crate::aggregator::VoteAggregator;
use crate::broadcast::BroadcastHub;
use crate::db::models::Poll;
use crate::store::SharedStore;
use dashmap::DashMap;
use std::{fmt, sync::Arc};
use uuid::Uuid;

pub type Aggregators = DashMap<Uuid, Arc<VoteAggregator>>;

/// Maps poll ids to their live aggregator. At most one per id.
#[derive(Clone)]
pub struct PollRegistry {
    aggregators: Arc<Aggregators>,
    store: SharedStore,
    hub: BroadcastHub,
    queue_capacity: usize,
}

impl fmt::Debug for PollRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollRegistry")
            .field("aggregator_count", &self.aggregators.len())
            .field("queue_capacity", &self.queue_capacity)
            .finish()
    }
}

impl PollRegistry {
    pub fn new(store: SharedStore, hub: BroadcastHub, queue_capacity: usize) -> Self {
        Self {
            aggregators: Arc::new(DashMap::new()),
            store,
            hub,
            queue_capacity,
        }
    }

    /// Returns the aggregator for `poll_id`, starting one if none exists.
    ///
    /// Callers must have established that the poll exists; this never checks
    /// the store.
    pub fn ensure_aggregator(&self, poll_id: Uuid) -> Arc<VoteAggregator> {
        self.aggregators
            .entry(poll_id)
            .or_insert_with(|| {
                debug!(%poll_id, "starting aggregator");
                Arc::new(VoteAggregator::spawn(
                    poll_id,
                    self.store.clone(),
                    self.hub.clone(),
                    self.queue_capacity,
                    Arc::downgrade(&self.aggregators),
                ))
            })
            .value()
            .clone()
    }

    /// Live aggregator for `poll_id`, if any. Retired aggregators are evicted.
    pub fn get(&self, poll_id: Uuid) -> Option<Arc<VoteAggregator>> {
        let aggregator = self.aggregators.get(&poll_id).map(|entry| entry.value().clone())?;

        if aggregator.is_retired() {
            self.discard(&aggregator);
            return None;
        }

        Some(aggregator)
    }

    /// Retires `aggregator` and drops its entry, unless the entry has already
    /// been replaced by a newer aggregator for the same poll.
    pub fn discard(&self, aggregator: &Arc<VoteAggregator>) -> bool {
        aggregator.retire();
        let poll_id = aggregator.poll_id();
        let evicted = self
            .aggregators
            .remove_if(&poll_id, |_, current| Arc::ptr_eq(current, aggregator))
            .is_some();
        if evicted {
            debug!(%poll_id, "evicted retired aggregator");
        }
        evicted
    }

    /// Tears down the aggregator for a deleted poll.
    pub fn remove(&self, poll_id: Uuid) -> bool {
        match self.aggregators.remove(&poll_id) {
            Some((_, aggregator)) => {
                aggregator.retire();
                debug!(%poll_id, pending = aggregator.pending(), "aggregator removed");
                true
            }
            None => false,
        }
    }

    /// Starts aggregators for polls that already exist in the store.
    pub fn hydrate(&self, polls: &[Poll]) {
        for poll in polls {
            self.ensure_aggregator(poll.id);
        }
        info!(count = polls.len(), "registry hydrated from store");
    }

    pub fn len(&self) -> usize {
        self.aggregators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Choice;
    use crate::store::{MemoryPollStore, PollStore};
    use std::time::Duration;

    fn registry(store: Arc<MemoryPollStore>) -> PollRegistry {
        PollRegistry::new(store, BroadcastHub::default(), 8)
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let registry = registry(Arc::new(MemoryPollStore::new()));
        let id = Uuid::new_v4();

        let first = registry.ensure_aggregator(id);
        let second = registry.ensure_aggregator(id);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_retires_and_forgets() {
        let registry = registry(Arc::new(MemoryPollStore::new()));
        let id = Uuid::new_v4();
        let aggregator = registry.ensure_aggregator(id);

        assert!(registry.remove(id));
        assert!(aggregator.is_retired());
        assert!(registry.get(id).is_none());
        assert!(!registry.remove(id));
    }

    #[tokio::test]
    async fn test_get_evicts_retired_aggregator() {
        let registry = registry(Arc::new(MemoryPollStore::new()));
        let id = Uuid::new_v4();
        registry.ensure_aggregator(id).retire();

        assert!(registry.get(id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_hydrate_starts_one_per_poll() {
        let store = Arc::new(MemoryPollStore::new());
        store.create("One?").await.unwrap();
        store.create("Two?").await.unwrap();
        let registry = registry(store.clone());

        registry.hydrate(&store.list_all().await.unwrap());
        registry.hydrate(&store.list_all().await.unwrap());

        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn test_discard_spares_a_replacement() {
        let registry = registry(Arc::new(MemoryPollStore::new()));
        let id = Uuid::new_v4();
        let old = registry.ensure_aggregator(id);
        assert!(registry.discard(&old));

        let fresh = registry.ensure_aggregator(id);
        assert!(!registry.discard(&old));
        assert!(!fresh.is_retired());
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_worker_leaves_registry_when_poll_vanishes() {
        let store = Arc::new(MemoryPollStore::new());
        let poll = store.create("Deleted behind our back?").await.unwrap();
        let registry = registry(store.clone());
        let aggregator = registry.ensure_aggregator(poll.id);

        store.delete(poll.id).await.unwrap();
        aggregator.submit(Choice::Yes).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("worker should evict itself");
        assert!(aggregator.is_retired());
    }
}
