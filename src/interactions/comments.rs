//! Comment create/edit/delete and lazily subscribed comment panels.

use super::{ensure_owner, logged, InteractionEngine};
use crate::error::{FeedError, Result};
use crate::live::LiveList;
use crate::types::{Activity, Comment, CommentId, NewComment, PostId};
use std::sync::Arc;
use tracing::{debug, warn};

/// A freshly written comment and the activity it produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommentOutcome {
    pub comment: Comment,
    /// `None` if the comment was saved but its activity write failed.
    pub activity: Option<Activity>,
}

impl InteractionEngine {
    /// Comment on a post as the signed-in viewer.
    ///
    /// Always records a comment activity for the post's author, echoing the
    /// text.
    pub fn create_comment(&mut self, post: &PostId, content: &str) -> Result<CommentOutcome> {
        let viewer = self.session.require()?;
        self.validate_content(content)?;
        let author = self.known_post(post)?.author.clone();

        let comment = logged(
            "create_comment",
            self.store.create_comment(
                post,
                NewComment {
                    author: viewer.author_ref(),
                    content: content.to_string(),
                },
            ),
        )?;
        debug!(post_id = %post, comment_id = %comment.id, "comment created");

        let activity = match self
            .recorder
            .record_comment(&author, &viewer, post, content)
        {
            Ok(activity) => Some(activity),
            Err(e) => {
                warn!(post_id = %post, error = %e, "comment saved but activity was not");
                None
            }
        };

        Ok(CommentOutcome { comment, activity })
    }

    /// Replace a comment's text. Only its author may do this.
    pub fn edit_comment(&mut self, post: &PostId, comment: &CommentId, content: &str) -> Result<()> {
        let viewer = self.session.require()?;
        self.validate_content(content)?;
        let stored = self.stored_comment(post, comment)?;
        ensure_owner(&viewer, &stored.author.id, format!("comment {}", comment))?;

        logged(
            "edit_comment",
            self.store.update_comment_content(post, comment, content),
        )
    }

    /// Delete a comment. Only its author may do this.
    pub fn delete_comment(&mut self, post: &PostId, comment: &CommentId) -> Result<()> {
        let viewer = self.session.require()?;
        let stored = self.stored_comment(post, comment)?;
        ensure_owner(&viewer, &stored.author.id, format!("comment {}", comment))?;

        logged("delete_comment", self.store.delete_comment(post, comment))
    }

    fn stored_comment(&self, post: &PostId, comment: &CommentId) -> Result<Comment> {
        self.store
            .get_comment(post, comment)?
            .ok_or_else(|| FeedError::CommentNotFound(comment.clone()))
    }

    // --- Comment panels ---

    /// Show a post's comments: subscribes on first expansion.
    pub fn expand_comments(&mut self, post: &PostId) -> Result<&[Comment]> {
        let needs_subscription = self
            .comment_panels
            .get(post)
            .map_or(true, |panel| !panel.is_active());

        if needs_subscription {
            let store = Arc::clone(&self.store);
            let key = post.clone();
            let panel = LiveList::open(move || store.watch_comments(&key))?;
            debug!(post_id = %post, comments = panel.len(), "comment panel expanded");
            self.comment_panels.insert(post.clone(), panel);
        }

        self.poll_comments(post)
    }

    /// Hide a post's comments and release their subscription. Returns false
    /// if the panel was not expanded.
    pub fn collapse_comments(&mut self, post: &PostId) -> bool {
        match self.comment_panels.remove(post) {
            Some(mut panel) => {
                panel.close();
                debug!(post_id = %post, "comment panel collapsed");
                true
            }
            None => false,
        }
    }

    pub fn is_expanded(&self, post: &PostId) -> bool {
        self.comment_panels.contains_key(post)
    }

    /// Comments of an expanded panel, newest first, as last polled.
    pub fn comments(&self, post: &PostId) -> Option<&[Comment]> {
        self.comment_panels.get(post).map(LiveList::items)
    }

    /// Apply pending snapshots to an expanded panel.
    pub fn poll_comments(&mut self, post: &PostId) -> Result<&[Comment]> {
        let panel = self
            .comment_panels
            .get_mut(post)
            .ok_or(FeedError::SubscriptionClosed)?;
        panel.poll()?;
        Ok(panel.items())
    }
}

#[cfg(test)]
mod tests {
    use super::super::EngineConfig;
    use super::*;
    use crate::backend::{DocumentStore, MemoryStore};
    use crate::session::SessionStore;
    use crate::types::{ActivityKind, Identity, NewPost, Post};

    struct Fixture {
        store: Arc<MemoryStore>,
        session: Arc<SessionStore>,
        engine: InteractionEngine,
        post: Post,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let session = Arc::new(SessionStore::default());
        let post = store
            .create_post(NewPost {
                author: Identity::new("author", "Author").author_ref(),
                content: "hello".into(),
                image_url: None,
            })
            .unwrap();
        let engine = InteractionEngine::new(store.clone(), session.clone(), EngineConfig::default());
        Fixture {
            store,
            session,
            engine,
            post,
        }
    }

    #[test]
    fn test_create_comment_records_activity() {
        let mut f = fixture();
        f.session.sign_in(Identity::new("u1", "Ada")).unwrap();

        let outcome = f.engine.create_comment(&f.post.id, "nice post").unwrap();
        assert_eq!(outcome.comment.content, "nice post");
        let activity = outcome.activity.unwrap();
        assert_eq!(activity.kind, ActivityKind::Comment);
        assert_eq!(activity.content.as_deref(), Some("nice post"));
        assert_eq!(activity.target_user.as_str(), "author");
    }

    #[test]
    fn test_create_comment_validation() {
        let mut f = fixture();

        let err = f.engine.create_comment(&f.post.id, "hi").unwrap_err();
        assert!(matches!(err, FeedError::NotAuthenticated));

        f.session.sign_in(Identity::new("u1", "Ada")).unwrap();
        let err = f.engine.create_comment(&f.post.id, "   \n").unwrap_err();
        assert!(matches!(err, FeedError::EmptyContent));

        let long = "x".repeat(501);
        let err = f.engine.create_comment(&f.post.id, &long).unwrap_err();
        assert!(matches!(err, FeedError::ContentTooLong { len: 501, max: 500 }));

        assert_eq!(f.store.write_attempts(), 1); // the fixture post only
        assert!(f.store.activities().is_empty());
    }

    #[test]
    fn test_only_author_edits_or_deletes() {
        let mut f = fixture();
        f.session.sign_in(Identity::new("u1", "Ada")).unwrap();
        let comment = f.engine.create_comment(&f.post.id, "mine").unwrap().comment;

        f.session.sign_in(Identity::new("u2", "Bob")).unwrap();
        let writes = f.store.write_attempts();
        assert!(matches!(
            f.engine.edit_comment(&f.post.id, &comment.id, "hijacked"),
            Err(FeedError::NotOwner { .. })
        ));
        assert!(matches!(
            f.engine.delete_comment(&f.post.id, &comment.id),
            Err(FeedError::NotOwner { .. })
        ));
        assert_eq!(f.store.write_attempts(), writes);

        f.session.sign_in(Identity::new("u1", "Ada")).unwrap();
        f.engine
            .edit_comment(&f.post.id, &comment.id, "mine, edited")
            .unwrap();
        let stored = f.store.get_comment(&f.post.id, &comment.id).unwrap().unwrap();
        assert_eq!(stored.content, "mine, edited");

        f.engine.delete_comment(&f.post.id, &comment.id).unwrap();
        assert!(f.store.get_comment(&f.post.id, &comment.id).unwrap().is_none());

        // Only the create produced an activity.
        assert_eq!(f.store.activities().len(), 1);
    }

    #[test]
    fn test_panel_is_lazy_and_live() {
        let mut f = fixture();
        f.session.sign_in(Identity::new("u1", "Ada")).unwrap();
        f.engine.create_comment(&f.post.id, "first").unwrap();
        assert_eq!(f.store.subscription_count(), 0);
        assert!(f.engine.comments(&f.post.id).is_none());

        let shown = f.engine.expand_comments(&f.post.id).unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(f.store.subscription_count(), 1);

        f.engine.create_comment(&f.post.id, "second").unwrap();
        let shown = f.engine.poll_comments(&f.post.id).unwrap();
        assert_eq!(shown[0].content, "second");
        assert_eq!(shown[1].content, "first");

        assert!(f.engine.collapse_comments(&f.post.id));
        assert!(!f.engine.collapse_comments(&f.post.id));
        assert_eq!(f.store.subscription_count(), 0);
        assert!(matches!(
            f.engine.poll_comments(&f.post.id),
            Err(FeedError::SubscriptionClosed)
        ));
    }

    #[test]
    fn test_failed_comment_write_is_reported() {
        let mut f = fixture();
        f.session.sign_in(Identity::new("u1", "Ada")).unwrap();
        f.store.fail_next_writes(1, "offline");

        let err = f.engine.create_comment(&f.post.id, "hi").unwrap_err();
        assert!(err.is_retryable());
        assert!(f.store.activities().is_empty());
        assert_eq!(f.store.comment_count(&f.post.id), 0);
    }
}
