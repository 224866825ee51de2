//! Live, scoped views of posts.

use crate::backend::DocumentStore;
use crate::error::{FeedError, Result};
use crate::live::LiveList;
use crate::subscriptions::LiveStream;
use crate::types::{Identity, Post, PostId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Which posts a feed observes. Every scope orders newest first.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum FeedScope {
    /// Every post.
    Global,
    /// Posts written by one user.
    Author(UserId),
    /// A single post (detail view).
    Post(PostId),
}

impl FeedScope {
    pub fn matches(&self, post: &Post) -> bool {
        match self {
            FeedScope::Global => true,
            FeedScope::Author(author) => &post.author.id == author,
            FeedScope::Post(id) => &post.id == id,
        }
    }
}

/// A standing subscription to the posts of one scope.
///
/// Each snapshot replaces the held posts outright. The feed only reads; all
/// writes go through the interaction engine.
pub struct FeedSubscription {
    store: Option<Arc<dyn DocumentStore>>,
    scope: FeedScope,
    posts: LiveList<Post>,
}

impl FeedSubscription {
    /// Subscribe to `scope` and load the current snapshot.
    pub fn open(store: Arc<dyn DocumentStore>, scope: FeedScope) -> Result<Self> {
        let posts = Self::subscribe(&store, &scope)?;
        debug!(?scope, posts = posts.len(), "feed opened");
        Ok(Self {
            store: Some(store),
            scope,
            posts,
        })
    }

    /// Drive a feed from an existing stream, e.g. a scripted one. Such a feed
    /// cannot be rescoped.
    pub fn from_stream(scope: FeedScope, stream: LiveStream<Vec<Post>>) -> Self {
        let retain_scope = scope.clone();
        Self {
            store: None,
            posts: LiveList::from_stream(stream).with_retain(move |p| retain_scope.matches(p)),
            scope,
        }
    }

    fn subscribe(store: &Arc<dyn DocumentStore>, scope: &FeedScope) -> Result<LiveList<Post>> {
        let source = Arc::clone(store);
        let query = scope.clone();
        let retain_scope = scope.clone();
        Ok(LiveList::open(move || source.watch_posts(&query))?
            .with_retain(move |p| retain_scope.matches(p)))
    }

    pub fn scope(&self) -> &FeedScope {
        &self.scope
    }

    /// Posts as of the last applied snapshot, newest first.
    pub fn posts(&self) -> &[Post] {
        self.posts.items()
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.posts.items().iter().find(|p| &p.id == id)
    }

    pub fn is_active(&self) -> bool {
        self.posts.is_active()
    }

    pub fn restarts(&self) -> u64 {
        self.posts.restarts()
    }

    /// Apply buffered snapshots. Returns true if the posts changed.
    pub fn poll(&mut self) -> Result<bool> {
        self.posts.poll()
    }

    /// Block up to `timeout` for the next snapshot.
    pub fn wait(&mut self, timeout: Duration) -> Result<bool> {
        self.posts.wait(timeout)
    }

    /// Point the feed at a new scope. Re-subscribes only when the scope (or
    /// the liveness of the feed) actually changes; returns whether it did.
    pub fn set_scope(&mut self, scope: FeedScope) -> Result<bool> {
        if scope == self.scope && self.posts.is_active() {
            return Ok(false);
        }
        let store = self.store.clone().ok_or(FeedError::SubscriptionClosed)?;

        self.posts.close();
        self.posts = Self::subscribe(&store, &scope)?;
        debug!(from = ?self.scope, to = ?scope, "feed rescoped");
        self.scope = scope;
        Ok(true)
    }

    /// Follow the signed-in user for a "my posts" feed: rescope to their
    /// posts once known, close and clear on sign-out.
    pub fn track_identity(&mut self, identity: Option<&Identity>) -> Result<bool> {
        match identity {
            Some(identity) => self.set_scope(FeedScope::Author(identity.id.clone())),
            None => {
                let was_active = self.posts.is_active();
                self.posts.close();
                self.posts.apply_snapshot(Vec::new());
                Ok(was_active)
            }
        }
    }

    /// Tear down the subscription. Cached posts stay readable.
    pub fn close(&mut self) {
        self.posts.close();
    }
}

impl std::fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("scope", &self.scope)
            .field("posts", &self.posts)
            .finish()
    }
}
