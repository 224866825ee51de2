//! Subscription manager for fanning out live query snapshots.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::types::{DropReason, LiveEvent, LiveStream, SubscriptionConfig, SubscriptionId};

/// One live query and the channel feeding its stream.
struct Subscription<Q, T> {
    query: Q,
    sender: Sender<LiveEvent<T>>,
}

impl<Q, T> Subscription<Q, T> {
    /// Try to send an event. Returns false if the buffer is full or the
    /// receiver is gone (subscriber will be dropped).
    fn try_send(&self, event: LiveEvent<T>) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Manages live subscriptions keyed by a query `Q`, each receiving full
/// snapshots of type `T`.
pub struct SubscriptionManager<Q, T> {
    /// Live queries by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription<Q, T>>>,
    /// Next ID to hand out.
    next_id: AtomicU64,
    config: SubscriptionConfig,
}

impl<Q, T> SubscriptionManager<Q, T>
where
    Q: Send + Sync + 'static,
    T: Clone + Send + 'static,
{
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a live query.
    ///
    /// The returned stream unsubscribes itself when closed or dropped. No
    /// snapshot is sent yet; the caller delivers the initial one with
    /// [`send_to`](Self::send_to).
    pub fn subscribe(self: &Arc<Self>, query: Q) -> LiveStream<T> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(self.config.buffer_size.max(1));

        self.subscriptions
            .write()
            .insert(id, Subscription { query, sender });
        debug!(subscription = id.0, "subscribed");

        let manager: Weak<Self> = Arc::downgrade(self);
        LiveStream::new(id, receiver, move || {
            if let Some(manager) = manager.upgrade() {
                manager.unsubscribe(id);
            }
        })
    }

    /// Forget a live query. Its stream sees `Unsubscribed` if still listening.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            debug!(subscription = id.0, "unsubscribed");
            // Best effort; the receiver may already be gone.
            let _ = sub.sender.try_send(LiveEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Live queries currently registered.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Deliver a snapshot to one live query, typically its initial result.
    /// A query that cannot take it is dropped and false is returned.
    pub fn send_to(&self, id: SubscriptionId, snapshot: T) -> bool {
        let delivered = match self.subscriptions.read().get(&id) {
            Some(sub) => sub.try_send(LiveEvent::Snapshot(snapshot)),
            None => return false,
        };
        if !delivered {
            self.drop_subscribers(vec![id], DropReason::BufferOverflow);
        }
        delivered
    }

    /// Push a fresh snapshot to every subscription whose query is affected.
    ///
    /// `snapshot_for` returns `None` for queries the change does not touch.
    /// Subscribers that fail to receive are dropped.
    pub fn broadcast_with<F>(&self, mut snapshot_for: F)
    where
        F: FnMut(&Q) -> Option<T>,
    {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            for (id, sub) in subs.iter() {
                if let Some(snapshot) = snapshot_for(&sub.query) {
                    if !sub.try_send(LiveEvent::Snapshot(snapshot)) {
                        to_remove.push(*id);
                    }
                }
            }
        }

        if !to_remove.is_empty() {
            self.drop_subscribers(to_remove, DropReason::BufferOverflow);
        }
    }

    /// Drop every subscription, telling each why.
    pub fn close_all(&self, reason: DropReason) {
        let ids: Vec<SubscriptionId> = self.subscriptions.read().keys().copied().collect();
        self.drop_subscribers(ids, reason);
    }

    fn drop_subscribers(&self, ids: Vec<SubscriptionId>, reason: DropReason) {
        let mut subs = self.subscriptions.write();
        for id in ids {
            if let Some(sub) = subs.remove(&id) {
                warn!(subscription = id.0, ?reason, "dropping subscriber");
                // Might fail if the buffer is still full, that's ok: the
                // receiver then sees a disconnect once the sender is gone.
                let _ = sub.sender.try_send(LiveEvent::Dropped {
                    reason: reason.clone(),
                });
            }
        }
    }
}
