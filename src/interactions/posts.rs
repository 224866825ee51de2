//! Post create/edit/delete.

use super::{ensure_owner, logged, InteractionEngine, LikeState};
use crate::error::Result;
use crate::types::{NewPost, Post, PostId};
use tracing::debug;

impl InteractionEngine {
    /// Publish a post as the signed-in viewer. The image, if any, was
    /// uploaded elsewhere; only its URL is stored.
    pub fn create_post(&mut self, content: &str, image_url: Option<String>) -> Result<Post> {
        let viewer = self.session.require()?;
        self.validate_content(content)?;

        let post = logged(
            "create_post",
            self.store.create_post(NewPost {
                author: viewer.author_ref(),
                content: content.to_string(),
                image_url,
            }),
        )?;
        self.likes.insert(post.id.clone(), LikeState::from_post(&post));
        debug!(post_id = %post.id, "post created");
        Ok(post)
    }

    /// Replace a post's text in place. Author only; the image is kept and no
    /// activity is recorded.
    pub fn edit_post(&mut self, post: &PostId, content: &str) -> Result<()> {
        let viewer = self.session.require()?;
        self.validate_content(content)?;
        let author = self.known_post(post)?.author.clone();
        ensure_owner(&viewer, &author, format!("post {}", post))?;

        logged(
            "edit_post",
            self.store.update_post_content(post, content),
        )
    }

    /// Delete a post. Author only. Its comments are deleted with it when
    /// `cascade_comment_delete` is set, and left orphaned otherwise.
    pub fn delete_post(&mut self, post: &PostId) -> Result<()> {
        let viewer = self.session.require()?;
        let author = self.known_post(post)?.author.clone();
        ensure_owner(&viewer, &author, format!("post {}", post))?;

        let cascade = self.config.cascade_comment_delete;
        logged("delete_post", self.store.delete_post(post, cascade))?;
        self.forget(post);
        debug!(post_id = %post, cascade, "post deleted");
        Ok(())
    }
}
