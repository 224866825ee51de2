//! Like toggling with optimistic updates.

use super::{logged, InteractionEngine};
use crate::error::Result;
use crate::types::{Activity, Post, PostId, UserId};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Locally known like state of one post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LikeState {
    pub author: UserId,
    pub likes: BTreeSet<UserId>,
}

impl LikeState {
    pub fn from_post(post: &Post) -> Self {
        Self {
            author: post.author.id.clone(),
            likes: post.likes.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }
}

/// Result of a like toggle, as displayed right after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LikeOutcome {
    /// Whether the viewer now likes the post.
    pub liked: bool,
    pub like_count: usize,
    /// Activity written for a new like. `None` for unlikes, or if the
    /// activity write failed after the like itself succeeded.
    pub activity: Option<Activity>,
}

impl InteractionEngine {
    /// Like state of a post, if observed.
    pub fn like_state(&self, post: &PostId) -> Option<&LikeState> {
        self.likes.get(post)
    }

    /// Displayed like count (optimistic until the next snapshot).
    pub fn like_count(&self, post: &PostId) -> Option<usize> {
        self.likes.get(post).map(LikeState::count)
    }

    /// Whether the signed-in viewer likes the post. False when signed out.
    pub fn is_liked(&self, post: &PostId) -> bool {
        match (self.session.current(), self.likes.get(post)) {
            (Some(viewer), Some(state)) => state.is_liked_by(&viewer.id),
            _ => false,
        }
    }

    /// Flip the viewer's like on a post.
    ///
    /// The local like set changes before the write is issued. Only a new like
    /// produces an activity record; unlikes are silent.
    pub fn toggle_like(&mut self, post: &PostId) -> Result<LikeOutcome> {
        let viewer = self.session.require()?;
        let rollback = self.config.rollback_on_write_failure;

        let state = self.known_post(post)?;
        let adding = !state.likes.contains(&viewer.id);
        flip(&mut state.likes, &viewer.id, adding);
        let author = state.author.clone();
        debug!(post_id = %post, adding, count = state.count(), "optimistic like toggle");

        let write = if adding {
            self.store.add_like(post, &viewer.id)
        } else {
            self.store.remove_like(post, &viewer.id)
        };

        if let Err(e) = logged("toggle_like", write) {
            if rollback {
                if let Some(state) = self.likes.get_mut(post) {
                    flip(&mut state.likes, &viewer.id, !adding);
                }
                warn!(post_id = %post, "like toggle rolled back");
            }
            return Err(e);
        }

        let activity = if adding {
            match self.recorder.record_like(&author, &viewer, post) {
                Ok(activity) => Some(activity),
                Err(e) => {
                    warn!(post_id = %post, error = %e, "like saved but activity was not");
                    None
                }
            }
        } else {
            None
        };

        let like_count = self.likes.get(post).map_or(0, LikeState::count);
        Ok(LikeOutcome {
            liked: adding,
            like_count,
            activity,
        })
    }
}

fn flip(likes: &mut BTreeSet<UserId>, user: &UserId, add: bool) {
    if add {
        likes.insert(user.clone());
    } else {
        likes.remove(user);
    }
}
