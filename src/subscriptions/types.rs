//! Subscription types for live query updates.

use crossbeam_channel::{Receiver, RecvError, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Buffering for live query streams.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionConfig {
    /// Max buffered snapshots before dropping the subscriber.
    /// Default: 64
    pub buffer_size: usize,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { buffer_size: 64 }
    }
}

/// Events delivered on a live stream.
#[derive(Clone, Debug, PartialEq)]
pub enum LiveEvent<T> {
    /// Full replacement of the subscriber's view.
    Snapshot(T),

    /// Subscription was dropped; no further events follow.
    Dropped { reason: DropReason },
}

/// Why a live query stopped delivering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The consumer fell behind and its buffer filled up.
    BufferOverflow,
    /// The publishing side went away.
    Disconnected,
    /// Backend error.
    Error(String),
    /// The consumer closed its stream.
    Unsubscribed,
}

/// Identifies one live query within its manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// What a non-blocking drain found on a stream.
#[derive(Debug)]
pub struct Drained<T> {
    /// Most recent snapshot, if any arrived. Older ones are superseded.
    pub latest: Option<T>,
    /// Set when the stream ended during this drain.
    pub dropped: Option<DropReason>,
}

type Canceller = Box<dyn FnOnce() + Send>;

/// Handle to a live subscription.
///
/// Yields full snapshots in the order the publisher emitted them. Closing the
/// handle (or dropping it) releases the subscription on the publishing side.
pub struct LiveStream<T> {
    id: SubscriptionId,
    receiver: Receiver<LiveEvent<T>>,
    canceller: Option<Canceller>,
    closed: bool,
}

impl<T> LiveStream<T> {
    /// Wrap a receiver; `canceller` runs once on close.
    pub fn new(
        id: SubscriptionId,
        receiver: Receiver<LiveEvent<T>>,
        canceller: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            receiver,
            canceller: Some(Box::new(canceller)),
            closed: false,
        }
    }

    /// A stream fed by hand. Useful for replaying a scripted sequence of
    /// snapshots into a view.
    pub fn scripted(capacity: usize) -> (Sender<LiveEvent<T>>, Self) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        let stream = Self {
            id: SubscriptionId(0),
            receiver,
            canceller: None,
            closed: false,
        };
        (sender, stream)
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Block until the next event arrives.
    pub fn recv(&self) -> Result<LiveEvent<T>, RecvError> {
        self.receiver.recv()
    }

    /// Next buffered event, if any.
    pub fn try_recv(&self) -> Result<LiveEvent<T>, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<LiveEvent<T>, RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Take everything currently buffered without blocking.
    pub fn drain(&mut self) -> Drained<T> {
        let mut drained = Drained {
            latest: None,
            dropped: None,
        };
        if self.closed {
            return drained;
        }

        loop {
            match self.receiver.try_recv() {
                Ok(LiveEvent::Snapshot(value)) => drained.latest = Some(value),
                Ok(LiveEvent::Dropped { reason }) => {
                    drained.dropped = Some(reason);
                    self.closed = true;
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    drained.dropped = Some(DropReason::Disconnected);
                    self.closed = true;
                    break;
                }
            }
        }
        drained
    }

    /// Wait up to `timeout` for the next snapshot.
    ///
    /// Returns `Ok(None)` on timeout and `Err(reason)` once the stream ended.
    pub fn next_timeout(&mut self, timeout: Duration) -> Result<Option<T>, DropReason> {
        if self.closed {
            return Err(DropReason::Unsubscribed);
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(LiveEvent::Snapshot(value)) => Ok(Some(value)),
            Ok(LiveEvent::Dropped { reason }) => {
                self.closed = true;
                Err(reason)
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Err(DropReason::Disconnected)
            }
        }
    }

    /// Release the subscription. Idempotent.
    pub fn close(&mut self) {
        self.closed = true;
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }
}

impl<T> Iterator for LiveStream<T> {
    type Item = T;

    /// Blocks for the next snapshot; ends when the subscription is dropped.
    fn next(&mut self) -> Option<T> {
        if self.closed {
            return None;
        }
        match self.receiver.recv() {
            Ok(LiveEvent::Snapshot(value)) => Some(value),
            Ok(LiveEvent::Dropped { .. }) | Err(_) => {
                self.closed = true;
                None
            }
        }
    }
}

impl<T> Drop for LiveStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<T> std::fmt::Debug for LiveStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish()
    }
}
