use crate::broadcast::models::{BroadcastEvent, TallyUpdate};
use crate::db::models::Tally;
use dashmap::DashMap;
use futures::Stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use uuid::Uuid;

type Subscribers = DashMap<Uuid, Subscriber>;

/// Newest tally per poll that did not fit in a subscriber's buffer.
type Lagged = Mutex<HashMap<Uuid, TallyUpdate>>;

pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

struct Subscriber {
    sender: mpsc::Sender<BroadcastEvent>,
    lagged: Arc<Lagged>,
}

impl Subscriber {
    /// Never waits. A tally that finds the buffer full replaces any older
    /// held-back tally for the same poll and is handed out once the buffer
    /// drains; other events are dropped.
    fn offer(&self, event: &BroadcastEvent) -> Result<(), TrySendError<BroadcastEvent>> {
        let BroadcastEvent::Tally(update) = event else {
            return self.sender.try_send(event.clone());
        };

        let mut lagged = self.lagged.lock();
        match self.sender.try_send(event.clone()) {
            Ok(()) => {
                lagged.remove(&update.id);
                Ok(())
            }
            Err(TrySendError::Full(event)) => {
                lagged.insert(update.id, *update);
                Err(TrySendError::Full(event))
            }
            Err(closed) => Err(closed),
        }
    }
}

/// Fans events out to every connected client.
///
/// The hub only keeps the sending half of each subscriber channel. Dropping a
/// [`Subscription`] unregisters it; a receiver that vanished some other way is
/// pruned on the next publish.
#[derive(Clone)]
pub struct BroadcastHub {
    subscribers: Arc<Subscribers>,
    buffer: usize,
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("subscriber_count", &self.subscribers.len())
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl BroadcastHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let lagged = Arc::new(Lagged::default());
        let id = Uuid::new_v4();
        self.subscribers.insert(
            id,
            Subscriber {
                sender: tx,
                lagged: lagged.clone(),
            },
        );
        debug!(subscriber = %id, "subscriber registered");

        Subscription {
            id,
            receiver: rx,
            lagged,
            members: Arc::downgrade(&self.subscribers),
        }
    }

    /// Returns false if the subscriber was already gone.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = %id, "subscriber removed");
        }
        removed
    }

    pub fn publish_tally(&self, poll_id: Uuid, tally: Tally) -> usize {
        self.publish(BroadcastEvent::Tally(TallyUpdate { id: poll_id, tally }))
    }

    /// Delivers `event` to every subscriber without waiting on any of them.
    ///
    /// A full buffer holds back only the newest tally per poll for that
    /// subscriber and drops lifecycle notices; a closed one is unregistered.
    /// Returns how many subscribers accepted the event into their buffer.
    pub fn publish(&self, event: BroadcastEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().offer(&event) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber = %entry.key(),
                        event = event.name(),
                        poll_id = %event.poll_id(),
                        "subscriber buffer full"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shards are still read-locked inside the loop.
        for id in closed {
            self.unsubscribe(id);
        }

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

/// Receiving side of one client's channel.
pub struct Subscription {
    id: Uuid,
    receiver: mpsc::Receiver<BroadcastEvent>,
    lagged: Arc<Lagged>,
    members: Weak<Subscribers>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("lagged", &self.lagged.lock().len())
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn recv(&mut self) -> Option<BroadcastEvent> {
        std::future::poll_fn(|cx| self.poll_event(cx)).await
    }

    pub fn try_recv(&mut self) -> Option<BroadcastEvent> {
        let mut lagged = self.lagged.lock();
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => take_lagged(&mut lagged),
        }
    }

    // Held-back tallies are only handed out once the buffer is empty, so they
    // are always newer than anything already received for their poll.
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<BroadcastEvent>> {
        let mut lagged = self.lagged.lock();
        match self.receiver.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
            Poll::Ready(None) => Poll::Ready(take_lagged(&mut lagged)),
            Poll::Pending => match take_lagged(&mut lagged) {
                Some(event) => Poll::Ready(Some(event)),
                None => Poll::Pending,
            },
        }
    }
}

fn take_lagged(lagged: &mut HashMap<Uuid, TallyUpdate>) -> Option<BroadcastEvent> {
    let id = *lagged.keys().next()?;
    lagged.remove(&id).map(BroadcastEvent::Tally)
}

impl Stream for Subscription {
    type Item = BroadcastEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_event(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(members) = self.members.upgrade() {
            members.remove(&self.id);
        }
    }
}
