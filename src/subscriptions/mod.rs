//! Subscription system for live query updates.
//!
//! This module provides in-process subscriptions with snapshot semantics:
//! every event replaces the subscriber's view rather than patching it.
//!
//! Subscriptions support:
//! - Arbitrary query keys, matched by the publisher on each change
//! - Explicit cancellation (`close`, or dropping the handle)
//! - Bounded buffers with slow-subscriber dropping
//!
//! # Example
//!
//! ```ignore
//! let manager = Arc::new(SubscriptionManager::new(SubscriptionConfig::default()));
//!
//! let mut stream = manager.subscribe(FeedScope::Global);
//! manager.send_to(stream.id(), current_posts());
//!
//! for snapshot in &mut stream {
//!     println!("{} posts", snapshot.len());
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, Drained, LiveEvent, LiveStream, SubscriptionConfig, SubscriptionId,
};
