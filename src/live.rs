//! Locally cached result set of a live query.

use crate::error::{FeedError, Result};
use crate::subscriptions::{DropReason, LiveStream};
use crate::types::{sort_newest_first, Chronological};
use std::time::Duration;
use tracing::{debug, warn};

type Subscribe<T> = Box<dyn Fn() -> Result<LiveStream<Vec<T>>> + Send>;
type Retain<T> = Box<dyn Fn(&T) -> bool + Send>;

/// Newest-first list kept in sync with a live query.
///
/// Every snapshot replaces the whole list after being re-filtered and
/// re-sorted locally. If the publisher drops the subscription because this
/// consumer fell behind, the list re-subscribes and picks up a fresh snapshot.
pub struct LiveList<T> {
    subscribe: Option<Subscribe<T>>,
    retain: Retain<T>,
    stream: Option<LiveStream<Vec<T>>>,
    items: Vec<T>,
    snapshots_applied: u64,
    restarts: u64,
}

impl<T: Chronological> LiveList<T> {
    /// Subscribe now and load whatever snapshot is already waiting.
    pub fn open<F>(subscribe: F) -> Result<Self>
    where
        F: Fn() -> Result<LiveStream<Vec<T>>> + Send + 'static,
    {
        let stream = subscribe()?;
        let mut list = Self {
            subscribe: Some(Box::new(subscribe)),
            retain: Box::new(|_| true),
            stream: Some(stream),
            items: Vec::new(),
            snapshots_applied: 0,
            restarts: 0,
        };
        list.poll()?;
        Ok(list)
    }

    /// Wrap an existing stream. The list cannot restart it.
    pub fn from_stream(stream: LiveStream<Vec<T>>) -> Self {
        Self {
            subscribe: None,
            retain: Box::new(|_| true),
            stream: Some(stream),
            items: Vec::new(),
            snapshots_applied: 0,
            restarts: 0,
        }
    }

    /// Only keep items matching `retain` from every snapshot.
    pub fn with_retain<F>(mut self, retain: F) -> Self
    where
        F: Fn(&T) -> bool + Send + 'static,
    {
        self.retain = Box::new(retain);
        self.items.retain(|item| (self.retain)(item));
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True while a subscription is held.
    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn snapshots_applied(&self) -> u64 {
        self.snapshots_applied
    }

    /// Times the list re-subscribed after being dropped as a slow consumer.
    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Replace the list with `snapshot`.
    pub fn apply_snapshot(&mut self, mut snapshot: Vec<T>) {
        snapshot.retain(|item| (self.retain)(item));
        sort_newest_first(&mut snapshot);
        self.items = snapshot;
        self.snapshots_applied += 1;
    }

    /// Apply whatever is buffered without blocking. Returns true if the list
    /// changed.
    pub fn poll(&mut self) -> Result<bool> {
        let mut updated = false;

        // One restart per poll at most; a fresh subscription that overflows
        // immediately is left for the next poll.
        for _ in 0..2 {
            let Some(stream) = self.stream.as_mut() else {
                break;
            };
            let drained = stream.drain();
            if let Some(snapshot) = drained.latest {
                self.apply_snapshot(snapshot);
                updated = true;
            }
            match drained.dropped {
                None => break,
                Some(reason) => {
                    if !self.restart(reason)? {
                        break;
                    }
                }
            }
        }

        Ok(updated)
    }

    /// Block up to `timeout` for the next snapshot, then apply anything else
    /// that is buffered. Returns false on timeout.
    pub fn wait(&mut self, timeout: Duration) -> Result<bool> {
        let stream = self.stream.as_mut().ok_or(FeedError::SubscriptionClosed)?;
        match stream.next_timeout(timeout) {
            Ok(Some(snapshot)) => {
                self.apply_snapshot(snapshot);
                self.poll()?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(reason) => {
                if self.restart(reason)? {
                    self.poll()
                } else {
                    Err(FeedError::SubscriptionClosed)
                }
            }
        }
    }

    /// Release the subscription and keep the last items.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!(subscription = stream.id().0, "closing live list");
            stream.close();
        }
    }

    /// Handle a dropped stream. Returns true if a new subscription was made.
    fn restart(&mut self, reason: DropReason) -> Result<bool> {
        self.stream = None;

        let restartable = matches!(reason, DropReason::BufferOverflow | DropReason::Disconnected);
        let Some(subscribe) = self.subscribe.as_ref().filter(|_| restartable) else {
            warn!(?reason, "live query ended");
            return Ok(false);
        };

        warn!(?reason, "live query dropped, re-subscribing");
        self.stream = Some(subscribe()?);
        self.restarts += 1;
        Ok(true)
    }
}

impl<T> std::fmt::Debug for LiveList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveList")
            .field("items", &self.items.len())
            .field("active", &self.stream.is_some())
            .field("snapshots_applied", &self.snapshots_applied)
            .field("restarts", &self.restarts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::LiveEvent;
    use crate::types::{Activity, ActivityId, ActivityKind, Timestamp, UserId};

    fn activity(id: &str, at: i64) -> Activity {
        Activity {
            id: ActivityId::from(id),
            kind: ActivityKind::Follow,
            target_user: UserId::from("u1"),
            actor_id: UserId::from("u2"),
            actor_display_name: "Bob".into(),
            post_id: None,
            content: None,
            created_at: Timestamp(at),
        }
    }

    #[test]
    fn test_snapshot_replaces_items() {
        let (tx, stream) = LiveStream::scripted(8);
        let mut list = LiveList::from_stream(stream);

        tx.send(LiveEvent::Snapshot(vec![activity("a", 1), activity("b", 2)]))
            .unwrap();
        assert!(list.poll().unwrap());
        assert_eq!(list.items()[0].id.as_str(), "b");

        tx.send(LiveEvent::Snapshot(vec![activity("c", 3)])).unwrap();
        assert!(list.poll().unwrap());
        assert_eq!(list.len(), 1);
        assert_eq!(list.snapshots_applied(), 2);

        assert!(!list.poll().unwrap());
    }

    #[test]
    fn test_scripted_list_does_not_restart() {
        let (tx, stream) = LiveStream::<Vec<Activity>>::scripted(8);
        let mut list = LiveList::from_stream(stream);

        tx.send(LiveEvent::Dropped {
            reason: DropReason::BufferOverflow,
        })
        .unwrap();
        assert!(!list.poll().unwrap());
        assert!(!list.is_active());
        assert!(matches!(
            list.wait(Duration::from_millis(5)),
            Err(FeedError::SubscriptionClosed)
        ));
    }

    #[test]
    fn test_retain_filters_snapshots() {
        let (tx, stream) = LiveStream::scripted(8);
        let mut list =
            LiveList::from_stream(stream).with_retain(|a: &Activity| a.id.as_str() != "hidden");

        tx.send(LiveEvent::Snapshot(vec![activity("hidden", 5), activity("shown", 1)]))
            .unwrap();
        list.wait(Duration::from_millis(100)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.items()[0].id.as_str(), "shown");
    }
}
