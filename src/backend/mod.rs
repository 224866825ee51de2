//! Contracts for the hosted services the feed core talks to.
//!
//! The core never reaches a network directly. Everything goes through
//! [`DocumentStore`] (records plus live queries) and [`AuthService`]
//! (identity). [`MemoryStore`] and [`MemoryAuth`] implement both in-process.

mod memory;

pub use memory::{MemoryAuth, MemoryStore};

use crate::error::{AuthError, Result};
use crate::feed::FeedScope;
use crate::subscriptions::LiveStream;
use crate::types::{
    Activity, Comment, CommentId, Identity, NewActivity, NewComment, NewPost, Post, PostId,
    UserId,
};

/// Document store with point writes, set helpers and live queries.
///
/// Live queries start with the current result set and then deliver a full
/// snapshot after every change that touches the query.
pub trait DocumentStore: Send + Sync {
    // --- Posts ---

    fn create_post(&self, post: NewPost) -> Result<Post>;

    fn get_post(&self, id: &PostId) -> Result<Option<Post>>;

    /// Replace the post body and bump `updated_at`. The image is untouched.
    fn update_post_content(&self, id: &PostId, content: &str) -> Result<()>;

    /// Remove the post. With `cascade_comments` its comment collection goes
    /// too; otherwise the comments are left behind.
    fn delete_post(&self, id: &PostId, cascade_comments: bool) -> Result<()>;

    /// Atomic set-add on the like set. Adding an existing member is a no-op.
    fn add_like(&self, id: &PostId, user: &UserId) -> Result<()>;

    /// Atomic set-remove on the like set. Removing a non-member is a no-op.
    fn remove_like(&self, id: &PostId, user: &UserId) -> Result<()>;

    fn watch_posts(&self, scope: &FeedScope) -> Result<LiveStream<Vec<Post>>>;

    // --- Comments ---

    fn create_comment(&self, post: &PostId, comment: NewComment) -> Result<Comment>;

    fn get_comment(&self, post: &PostId, id: &CommentId) -> Result<Option<Comment>>;

    fn update_comment_content(&self, post: &PostId, id: &CommentId, content: &str) -> Result<()>;

    fn delete_comment(&self, post: &PostId, id: &CommentId) -> Result<()>;

    /// Comments of one post, newest first.
    fn watch_comments(&self, post: &PostId) -> Result<LiveStream<Vec<Comment>>>;

    // --- Activities ---

    fn append_activity(&self, activity: NewActivity) -> Result<Activity>;

    /// Activities addressed to `target`, newest first.
    fn watch_activities(&self, target: &UserId) -> Result<LiveStream<Vec<Activity>>>;

    // --- Users ---

    /// Create or replace the public profile stored under `identity.id`.
    fn upsert_user(&self, identity: &Identity) -> Result<()>;

    fn get_user(&self, id: &UserId) -> Result<Option<Identity>>;

    /// Users whose display name starts with `prefix`. Empty prefix lists all.
    fn search_users(&self, prefix: &str) -> Result<Vec<Identity>>;
}

/// Authentication service. Resolves credentials to an identity.
pub trait AuthService: Send + Sync {
    fn login(&self, email: &str, password: &str) -> std::result::Result<Identity, AuthError>;

    fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> std::result::Result<Identity, AuthError>;

    fn logout(&self) -> std::result::Result<(), AuthError>;
}
