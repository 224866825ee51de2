//! # Threadline
//!
//! Client-side core of a social feed: live post feeds, optimistic likes and
//! comments, and activity notifications, on top of a hosted document store.
//!
//! ## Core Concepts
//!
//! - **Feeds**: Live views of posts for a scope, replaced wholesale by every snapshot
//! - **Interactions**: Likes, comments and post edits applied locally first, then written
//! - **Activities**: Append-only notifications derived from interactions
//! - **Session**: The signed-in identity, shared and watchable
//!
//! ## Example
//!
//! ```ignore
//! use threadline::{ClientConfig, FeedClient, MemoryAuth, MemoryStore};
//!
//! let mut client = FeedClient::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryAuth::new()),
//!     ClientConfig::default(),
//! )?;
//! client.register("ada@example.com", "hunter22", "Ada")?;
//!
//! let mut feed = client.home_feed()?;
//! let post = client.engine().create_post("hello", None)?;
//! client.sync(&mut feed)?;
//!
//! let outcome = client.engine().toggle_like(&post.id)?;
//! assert_eq!(outcome.like_count, 1);
//! ```

pub mod activity;
pub mod backend;
pub mod client;
pub mod error;
pub mod feed;
pub mod interactions;
pub mod live;
pub mod session;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use activity::{ActivityFeed, ActivityRecorder};
pub use backend::{AuthService, DocumentStore, MemoryAuth, MemoryStore};
pub use client::{ClientConfig, FeedClient};
pub use error::{AuthError, FeedError, Result};
pub use feed::{FeedScope, FeedSubscription};
pub use interactions::{CommentOutcome, EngineConfig, InteractionEngine, LikeOutcome, LikeState};
pub use live::LiveList;
pub use session::{ProfileUpdate, SessionConfig, SessionStore};
pub use subscriptions::{
    DropReason, Drained, LiveEvent, LiveStream, SubscriptionConfig, SubscriptionId,
    SubscriptionManager,
};
pub use types::*;
