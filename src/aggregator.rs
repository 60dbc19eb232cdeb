//! Per-poll vote serialization.
//!
//! Each poll gets one worker task fed by a bounded queue. The worker applies
//! increments strictly in queue order and publishes every resulting tally, so
//! the n-th update a client sees for a poll reflects exactly n votes. Workers
//! for different polls share nothing but the store and the hub.
//!
//! Once retired, a worker still drains its queue into the store but publishes
//! nothing more. A worker that finds its poll gone retires itself and leaves
//! the registry.

use crate::broadcast::BroadcastHub;
use crate::db::models::{Choice, Tally};
use crate::error::PollError;
use crate::registry::Aggregators;
use crate::store::SharedStore;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct VoteAggregator {
    poll_id: Uuid,
    queue: mpsc::Sender<Choice>,
    retired: Arc<Mutex<bool>>,
}

impl VoteAggregator {
    /// Starts the worker on the current tokio runtime.
    ///
    /// `members` is the map the aggregator is registered in, if any; the
    /// worker removes its own entry when the poll turns out to be gone.
    pub fn spawn(
        poll_id: Uuid,
        store: SharedStore,
        hub: BroadcastHub,
        capacity: usize,
        members: Weak<Aggregators>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let retired = Arc::new(Mutex::new(false));

        let worker = Worker {
            poll_id,
            store,
            hub,
            retired: retired.clone(),
            members,
        };
        tokio::spawn(worker.run(rx));

        Self {
            poll_id,
            queue: tx,
            retired,
        }
    }

    pub fn poll_id(&self) -> Uuid {
        self.poll_id
    }

    /// Enqueues one vote, waiting for room if the queue is full.
    ///
    /// Only the enqueue is awaited. Failures while applying the vote are
    /// logged by the worker and never reach the submitter.
    pub async fn submit(&self, choice: Choice) -> Result<(), PollError> {
        if self.is_retired() {
            return Err(PollError::NotFound);
        }
        self.queue
            .send(choice)
            .await
            .map_err(|_| PollError::NotFound)
    }

    /// Stops accepting votes. Already queued votes still run, but no tally is
    /// published after this returns.
    pub fn retire(&self) {
        *self.retired.lock() = true;
    }

    pub fn is_retired(&self) -> bool {
        *self.retired.lock()
    }

    pub fn pending(&self) -> usize {
        self.queue.max_capacity() - self.queue.capacity()
    }
}

struct Worker {
    poll_id: Uuid,
    store: SharedStore,
    hub: BroadcastHub,
    retired: Arc<Mutex<bool>>,
    members: Weak<Aggregators>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Choice>) {
        let poll_id = self.poll_id;
        debug!(%poll_id, "aggregator started");

        while let Some(choice) = rx.recv().await {
            match self.store.apply_increment(poll_id, choice).await {
                Ok(tally) => match self.publish(tally) {
                    Some(delivered) => {
                        debug!(%poll_id, %choice, yes = tally.yes, no = tally.no, delivered, "vote applied");
                    }
                    None => debug!(%poll_id, %choice, "vote applied after removal, not published"),
                },
                Err(PollError::NotFound) => {
                    self.evict();
                    warn!(%poll_id, %choice, "poll no longer exists, dropping vote");
                }
                Err(e) => {
                    error!(%poll_id, %choice, error = %e, "failed to apply vote, dropping it");
                }
            }
        }

        debug!(%poll_id, "aggregator stopped");
    }

    /// Publishes under the retire lock, so a tally either goes out before the
    /// poll is retired or not at all.
    fn publish(&self, tally: Tally) -> Option<usize> {
        let retired = self.retired.lock();
        if *retired {
            return None;
        }
        Some(self.hub.publish_tally(self.poll_id, tally))
    }

    fn evict(&self) {
        *self.retired.lock() = true;
        if let Some(members) = self.members.upgrade() {
            let evicted = members
                .remove_if(&self.poll_id, |_, current| {
                    Arc::ptr_eq(&current.retired, &self.retired)
                })
                .is_some();
            if evicted {
                debug!(poll_id = %self.poll_id, "aggregator left the registry");
            }
        }
    }
}
