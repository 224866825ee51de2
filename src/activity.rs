//! Activity records: notifications derived from interactions.

use crate::backend::DocumentStore;
use crate::error::Result;
use crate::live::LiveList;
use crate::types::{Activity, ActivityKind, Identity, NewActivity, PostId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Appends activity records as a side effect of interactions.
///
/// Records are never updated or deleted once written.
#[derive(Clone)]
pub struct ActivityRecorder {
    store: Arc<dyn DocumentStore>,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// `actor` liked a post written by `target`.
    pub fn record_like(&self, target: &UserId, actor: &Identity, post: &PostId) -> Result<Activity> {
        self.record(ActivityKind::Like, target, actor, Some(post), None)
    }

    /// `actor` commented on a post written by `target`. The comment text is
    /// echoed into the record.
    pub fn record_comment(
        &self,
        target: &UserId,
        actor: &Identity,
        post: &PostId,
        content: &str,
    ) -> Result<Activity> {
        self.record(
            ActivityKind::Comment,
            target,
            actor,
            Some(post),
            Some(content.to_string()),
        )
    }

    /// `actor` started following `target`.
    pub fn record_follow(&self, target: &UserId, actor: &Identity) -> Result<Activity> {
        self.record(ActivityKind::Follow, target, actor, None, None)
    }

    fn record(
        &self,
        kind: ActivityKind,
        target: &UserId,
        actor: &Identity,
        post: Option<&PostId>,
        content: Option<String>,
    ) -> Result<Activity> {
        let activity = self.store.append_activity(NewActivity {
            kind,
            target_user: target.clone(),
            actor_id: actor.id.clone(),
            actor_display_name: actor.display_name.clone(),
            post_id: post.cloned(),
            content,
        })?;
        debug!(%kind, target = %target, actor = %actor.id, "activity recorded");
        Ok(activity)
    }
}

/// Live inbox of the activities addressed to one user, newest first.
pub struct ActivityFeed {
    target: UserId,
    activities: LiveList<Activity>,
}

impl ActivityFeed {
    pub fn open(store: Arc<dyn DocumentStore>, target: UserId) -> Result<Self> {
        let query = target.clone();
        let activities = LiveList::open(move || store.watch_activities(&query))?;
        Ok(Self { target, activities })
    }

    pub fn target(&self) -> &UserId {
        &self.target
    }

    pub fn activities(&self) -> &[Activity] {
        self.activities.items()
    }

    pub fn poll(&mut self) -> Result<bool> {
        self.activities.poll()
    }

    pub fn wait(&mut self, timeout: Duration) -> Result<bool> {
        self.activities.wait(timeout)
    }

    pub fn close(&mut self) {
        self.activities.close();
    }

    pub fn is_active(&self) -> bool {
        self.activities.is_active()
    }
}
