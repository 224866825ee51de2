//! Interaction engine: likes, comments and post ownership operations.
//!
//! Local state is updated optimistically and then written through the
//! document store. Authoritative snapshots passed to
//! [`InteractionEngine::observe`] always overwrite the local state; the
//! last applied update wins.
//!
//! Validation (signed in, non-empty content, ownership) happens before any
//! write is issued. Write failures are logged and returned; nothing retries.

mod comments;
mod likes;
mod posts;

pub use comments::CommentOutcome;
pub use likes::{LikeOutcome, LikeState};

use crate::activity::ActivityRecorder;
use crate::backend::DocumentStore;
use crate::error::{FeedError, Result};
use crate::live::LiveList;
use crate::session::SessionStore;
use crate::types::{Activity, Comment, Identity, Post, PostId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Interaction policy knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Revert an optimistic like toggle when its write fails.
    /// Default: true
    pub rollback_on_write_failure: bool,

    /// Delete a post's comments together with the post.
    /// Default: true
    pub cascade_comment_delete: bool,

    /// Longest accepted post or comment body, in characters (None = no limit).
    /// Default: 500
    pub max_content_chars: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rollback_on_write_failure: true,
            cascade_comment_delete: true,
            max_content_chars: Some(500),
        }
    }
}

/// Per-viewer interaction state over the posts the viewer has seen.
pub struct InteractionEngine {
    store: Arc<dyn DocumentStore>,
    session: Arc<SessionStore>,
    recorder: ActivityRecorder,
    config: EngineConfig,
    /// Like state of every post observed so far.
    likes: HashMap<PostId, LikeState>,
    /// Expanded comment panels.
    comment_panels: HashMap<PostId, LiveList<Comment>>,
}

impl InteractionEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        session: Arc<SessionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            recorder: ActivityRecorder::new(Arc::clone(&store)),
            store,
            session,
            config,
            likes: HashMap::new(),
            comment_panels: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    /// Reconcile with an authoritative snapshot. Overwrites any optimistic
    /// state held for these posts.
    pub fn observe(&mut self, posts: &[Post]) {
        for post in posts {
            self.likes.insert(post.id.clone(), LikeState::from_post(post));
        }
    }

    /// Reconcile with a snapshot that holds every existing post. Known posts
    /// missing from it are forgotten, along with their comment panels.
    pub fn observe_all(&mut self, posts: &[Post]) {
        let present: HashSet<&PostId> = posts.iter().map(|p| &p.id).collect();
        let gone: HashSet<PostId> = self
            .likes
            .keys()
            .chain(self.comment_panels.keys())
            .filter(|id| !present.contains(id))
            .cloned()
            .collect();
        for id in &gone {
            self.forget(id);
        }
        if !gone.is_empty() {
            debug!(forgotten = gone.len(), "pruned deleted posts");
        }
        self.observe(posts);
    }

    /// Forget a post, e.g. after it disappeared from every feed.
    pub fn forget(&mut self, post: &PostId) {
        self.likes.remove(post);
        self.comment_panels.remove(post);
    }

    /// The signed-in viewer starts following `target`.
    pub fn follow(&self, target: &UserId) -> Result<Activity> {
        let viewer = self.session.require()?;
        self.recorder.record_follow(target, &viewer)
    }

    // --- Helpers shared by the operation modules ---

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(FeedError::EmptyContent);
        }
        if let Some(max) = self.config.max_content_chars {
            let len = content.chars().count();
            if len > max {
                return Err(FeedError::ContentTooLong { len, max });
            }
        }
        Ok(())
    }

    /// Like state for `post`, fetched with a point read if not observed yet.
    fn known_post(&mut self, post: &PostId) -> Result<&mut LikeState> {
        if !self.likes.contains_key(post) {
            let fetched = self
                .store
                .get_post(post)?
                .ok_or_else(|| FeedError::PostNotFound(post.clone()))?;
            self.likes
                .insert(post.clone(), LikeState::from_post(&fetched));
        }
        self.likes
            .get_mut(post)
            .ok_or_else(|| FeedError::PostNotFound(post.clone()))
    }
}

fn ensure_owner(actor: &Identity, author: &UserId, resource: String) -> Result<()> {
    if &actor.id != author {
        return Err(FeedError::NotOwner {
            actor: actor.id.clone(),
            resource,
        });
    }
    Ok(())
}

/// Log a failed backend call at the call site and pass it on.
fn logged<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        warn!(op, error = %e, "write failed");
    }
    result
}

impl std::fmt::Debug for InteractionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionEngine")
            .field("config", &self.config)
            .field("known_posts", &self.likes.len())
            .field("open_panels", &self.comment_panels.len())
            .finish()
    }
}
