//! In-process document store and auth service.

use crate::error::{AuthError, FeedError, Result};
use crate::feed::FeedScope;
use crate::subscriptions::{DropReason, LiveStream, SubscriptionConfig, SubscriptionManager};
use crate::types::{
    generate_document_id, sort_newest_first, Activity, ActivityId, Comment, CommentId, Identity,
    NewActivity, NewComment, NewPost, Post, PostId, Timestamp, UserId,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AuthService, DocumentStore};

/// Everything the store holds. Serialized as a whole by `export`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Collections {
    posts: HashMap<PostId, Post>,
    /// Comment collections keyed by parent post. May outlive the post when
    /// it was deleted without cascading.
    comments: HashMap<PostId, HashMap<CommentId, Comment>>,
    activities: Vec<Activity>,
    users: BTreeMap<UserId, Identity>,
    /// Last server timestamp handed out.
    clock: i64,
    /// Counter feeding document id generation.
    next_doc: u64,
}

impl Collections {
    /// Strictly increasing server timestamp.
    fn server_time(&mut self) -> Timestamp {
        let now = Timestamp::now().0.max(self.clock + 1);
        self.clock = now;
        Timestamp(now)
    }

    fn next_id(&mut self, collection: &str) -> String {
        self.next_doc += 1;
        generate_document_id(collection, self.next_doc)
    }

    fn query_posts(&self, scope: &FeedScope) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .values()
            .filter(|p| scope.matches(p))
            .cloned()
            .collect();
        sort_newest_first(&mut posts);
        posts
    }

    fn query_comments(&self, post: &PostId) -> Vec<Comment> {
        let mut comments: Vec<Comment> = self
            .comments
            .get(post)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        sort_newest_first(&mut comments);
        comments
    }

    fn query_activities(&self, target: &UserId) -> Vec<Activity> {
        let mut activities: Vec<Activity> = self
            .activities
            .iter()
            .filter(|a| &a.target_user == target)
            .cloned()
            .collect();
        sort_newest_first(&mut activities);
        activities
    }
}

/// Document store held in memory, with live queries.
///
/// Writes are serialized by an internal lock; snapshots are pushed to
/// affected subscribers after each successful write. Failures can be
/// injected with [`fail_next_writes`](Self::fail_next_writes).
pub struct MemoryStore {
    data: RwLock<Collections>,

    /// Lock for write operations to ensure atomicity.
    write_lock: Mutex<()>,

    post_subs: Arc<SubscriptionManager<FeedScope, Vec<Post>>>,
    comment_subs: Arc<SubscriptionManager<PostId, Vec<Comment>>>,
    activity_subs: Arc<SubscriptionManager<UserId, Vec<Activity>>>,

    /// Upcoming writes that should fail: optional operation name and message.
    injected_failures: Mutex<VecDeque<(Option<&'static str>, String)>>,
    write_attempts: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(SubscriptionConfig::default())
    }

    pub fn with_config(config: SubscriptionConfig) -> Self {
        Self::from_collections(Collections::default(), config)
    }

    fn from_collections(data: Collections, config: SubscriptionConfig) -> Self {
        Self {
            data: RwLock::new(data),
            write_lock: Mutex::new(()),
            post_subs: Arc::new(SubscriptionManager::new(config.clone())),
            comment_subs: Arc::new(SubscriptionManager::new(config.clone())),
            activity_subs: Arc::new(SubscriptionManager::new(config)),
            injected_failures: Mutex::new(VecDeque::new()),
            write_attempts: AtomicU64::new(0),
        }
    }

    /// Serialize the whole store (MessagePack).
    pub fn export(&self) -> Result<Vec<u8>> {
        let data = self.data.read();
        Ok(rmp_serde::to_vec_named(&*data)?)
    }

    /// Rebuild a store from [`export`](Self::export) output. Subscriptions
    /// are not carried over.
    pub fn import(bytes: &[u8], config: SubscriptionConfig) -> Result<Self> {
        let data: Collections = rmp_serde::from_slice(bytes)?;
        Ok(Self::from_collections(data, config))
    }

    /// Make the next `count` writes fail with a backend error.
    pub fn fail_next_writes(&self, count: usize, message: &str) {
        let mut failures = self.injected_failures.lock();
        for _ in 0..count {
            failures.push_back((None, message.to_string()));
        }
    }

    /// Make the next write of operation `op` (e.g. `"append_activity"`) fail.
    /// Writes of other operations pass until it has fired.
    pub fn fail_next_op(&self, op: &'static str, message: &str) {
        self.injected_failures
            .lock()
            .push_back((Some(op), message.to_string()));
    }

    /// Number of write calls received, including rejected ones.
    pub fn write_attempts(&self) -> u64 {
        self.write_attempts.load(Ordering::SeqCst)
    }

    /// All activities ever appended, oldest first.
    pub fn activities(&self) -> Vec<Activity> {
        self.data.read().activities.clone()
    }

    /// Number of comments stored for a post, whether or not the post exists.
    pub fn comment_count(&self, post: &PostId) -> usize {
        self.data.read().comments.get(post).map_or(0, HashMap::len)
    }

    /// Active live queries across all collections.
    pub fn subscription_count(&self) -> usize {
        self.post_subs.subscription_count()
            + self.comment_subs.subscription_count()
            + self.activity_subs.subscription_count()
    }

    /// Drop every live query as if the connection was lost.
    pub fn disconnect_all(&self) {
        let reason = DropReason::Error("connection lost".to_string());
        self.post_subs.close_all(reason.clone());
        self.comment_subs.close_all(reason.clone());
        self.activity_subs.close_all(reason);
    }

    fn begin_write(&self, op: &'static str) -> Result<()> {
        self.write_attempts.fetch_add(1, Ordering::SeqCst);
        let mut failures = self.injected_failures.lock();
        let fires = matches!(failures.front(), Some((target, _)) if target.map_or(true, |t| t == op));
        if fires {
            if let Some((_, message)) = failures.pop_front() {
                warn!(op, %message, "write rejected");
                return Err(FeedError::Backend(message));
            }
        }
        Ok(())
    }

    // --- Fan-out ---

    /// Push new snapshots to every post query matching any of `touched`
    /// (old and new versions of the changed posts).
    fn notify_posts(&self, touched: &[Post]) {
        self.post_subs.broadcast_with(|scope| {
            if touched.iter().any(|p| scope.matches(p)) {
                Some(self.data.read().query_posts(scope))
            } else {
                None
            }
        });
    }

    fn notify_comments(&self, post: &PostId) {
        self.comment_subs.broadcast_with(|q| {
            if q == post {
                Some(self.data.read().query_comments(post))
            } else {
                None
            }
        });
    }

    fn notify_activities(&self, target: &UserId) {
        self.activity_subs.broadcast_with(|q| {
            if q == target {
                Some(self.data.read().query_activities(target))
            } else {
                None
            }
        });
    }

    /// Apply `mutate` to the like set of a post, notifying only on change.
    fn update_likes<F>(&self, id: &PostId, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeSet<UserId>) -> bool,
    {
        let _lock = self.write_lock.lock();
        let touched = {
            let mut data = self.data.write();
            let post = data
                .posts
                .get_mut(id)
                .ok_or_else(|| FeedError::PostNotFound(id.clone()))?;
            if !mutate(&mut post.likes) {
                return Ok(());
            }
            post.clone()
        };
        self.notify_posts(&[touched]);
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn create_post(&self, post: NewPost) -> Result<Post> {
        self.begin_write("create_post")?;
        let _lock = self.write_lock.lock();

        let created = {
            let mut data = self.data.write();
            let now = data.server_time();
            let id = PostId(data.next_id("posts"));
            let created = Post {
                id: id.clone(),
                author: post.author,
                content: post.content,
                image_url: post.image_url,
                likes: BTreeSet::new(),
                created_at: now,
                updated_at: now,
            };
            data.posts.insert(id, created.clone());
            created
        };

        debug!(post_id = %created.id, "post created");
        self.notify_posts(std::slice::from_ref(&created));
        Ok(created)
    }

    fn get_post(&self, id: &PostId) -> Result<Option<Post>> {
        Ok(self.data.read().posts.get(id).cloned())
    }

    fn update_post_content(&self, id: &PostId, content: &str) -> Result<()> {
        self.begin_write("update_post_content")?;
        let _lock = self.write_lock.lock();

        let touched = {
            let mut data = self.data.write();
            let now = data.server_time();
            let post = data
                .posts
                .get_mut(id)
                .ok_or_else(|| FeedError::PostNotFound(id.clone()))?;
            post.content = content.to_string();
            post.updated_at = now;
            post.clone()
        };

        self.notify_posts(&[touched]);
        Ok(())
    }

    fn delete_post(&self, id: &PostId, cascade_comments: bool) -> Result<()> {
        self.begin_write("delete_post")?;
        let _lock = self.write_lock.lock();

        let (removed, dropped_comments) = {
            let mut data = self.data.write();
            let removed = data
                .posts
                .remove(id)
                .ok_or_else(|| FeedError::PostNotFound(id.clone()))?;
            let dropped = if cascade_comments {
                data.comments.remove(id).map_or(0, |c| c.len())
            } else {
                0
            };
            (removed, dropped)
        };

        debug!(post_id = %id, cascade_comments, dropped_comments, "post deleted");
        self.notify_posts(&[removed]);
        if dropped_comments > 0 {
            self.notify_comments(id);
        }
        Ok(())
    }

    fn add_like(&self, id: &PostId, user: &UserId) -> Result<()> {
        self.begin_write("add_like")?;
        self.update_likes(id, |likes| likes.insert(user.clone()))
    }

    fn remove_like(&self, id: &PostId, user: &UserId) -> Result<()> {
        self.begin_write("remove_like")?;
        self.update_likes(id, |likes| likes.remove(user))
    }

    fn watch_posts(&self, scope: &FeedScope) -> Result<LiveStream<Vec<Post>>> {
        let stream = self.post_subs.subscribe(scope.clone());
        let initial = self.data.read().query_posts(scope);
        self.post_subs.send_to(stream.id(), initial);
        Ok(stream)
    }

    fn create_comment(&self, post: &PostId, comment: NewComment) -> Result<Comment> {
        self.begin_write("create_comment")?;
        let _lock = self.write_lock.lock();

        let created = {
            let mut data = self.data.write();
            if !data.posts.contains_key(post) {
                return Err(FeedError::PostNotFound(post.clone()));
            }
            let now = data.server_time();
            let id = CommentId(data.next_id("comments"));
            let created = Comment {
                id: id.clone(),
                post_id: post.clone(),
                author: comment.author,
                content: comment.content,
                created_at: now,
            };
            data.comments
                .entry(post.clone())
                .or_default()
                .insert(id, created.clone());
            created
        };

        self.notify_comments(post);
        Ok(created)
    }

    fn get_comment(&self, post: &PostId, id: &CommentId) -> Result<Option<Comment>> {
        Ok(self
            .data
            .read()
            .comments
            .get(post)
            .and_then(|c| c.get(id))
            .cloned())
    }

    fn update_comment_content(&self, post: &PostId, id: &CommentId, content: &str) -> Result<()> {
        self.begin_write("update_comment_content")?;
        let _lock = self.write_lock.lock();

        {
            let mut data = self.data.write();
            let comment = data
                .comments
                .get_mut(post)
                .and_then(|c| c.get_mut(id))
                .ok_or_else(|| FeedError::CommentNotFound(id.clone()))?;
            comment.content = content.to_string();
        }

        self.notify_comments(post);
        Ok(())
    }

    fn delete_comment(&self, post: &PostId, id: &CommentId) -> Result<()> {
        self.begin_write("delete_comment")?;
        let _lock = self.write_lock.lock();

        {
            let mut data = self.data.write();
            data.comments
                .get_mut(post)
                .and_then(|c| c.remove(id))
                .ok_or_else(|| FeedError::CommentNotFound(id.clone()))?;
        }

        self.notify_comments(post);
        Ok(())
    }

    fn watch_comments(&self, post: &PostId) -> Result<LiveStream<Vec<Comment>>> {
        let stream = self.comment_subs.subscribe(post.clone());
        let initial = self.data.read().query_comments(post);
        self.comment_subs.send_to(stream.id(), initial);
        Ok(stream)
    }

    fn append_activity(&self, activity: NewActivity) -> Result<Activity> {
        self.begin_write("append_activity")?;
        let _lock = self.write_lock.lock();

        let created = {
            let mut data = self.data.write();
            let now = data.server_time();
            let created = Activity {
                id: ActivityId(data.next_id("activities")),
                kind: activity.kind,
                target_user: activity.target_user,
                actor_id: activity.actor_id,
                actor_display_name: activity.actor_display_name,
                post_id: activity.post_id,
                content: activity.content,
                created_at: now,
            };
            data.activities.push(created.clone());
            created
        };

        self.notify_activities(&created.target_user);
        Ok(created)
    }

    fn watch_activities(&self, target: &UserId) -> Result<LiveStream<Vec<Activity>>> {
        let stream = self.activity_subs.subscribe(target.clone());
        let initial = self.data.read().query_activities(target);
        self.activity_subs.send_to(stream.id(), initial);
        Ok(stream)
    }

    fn upsert_user(&self, identity: &Identity) -> Result<()> {
        self.begin_write("upsert_user")?;
        let _lock = self.write_lock.lock();
        self.data
            .write()
            .users
            .insert(identity.id.clone(), identity.clone());
        debug!(user = %identity.id, "profile stored");
        Ok(())
    }

    fn get_user(&self, id: &UserId) -> Result<Option<Identity>> {
        Ok(self.data.read().users.get(id).cloned())
    }

    fn search_users(&self, prefix: &str) -> Result<Vec<Identity>> {
        Ok(self
            .data
            .read()
            .users
            .values()
            .filter(|u| u.display_name.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Minimum password length accepted by [`MemoryAuth`].
const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    password: String,
    identity: Identity,
}

/// Email/password auth held in memory.
pub struct MemoryAuth {
    accounts: RwLock<HashMap<String, Account>>,
    next_uid: AtomicU64,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            next_uid: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthService for MemoryAuth {
    fn login(&self, email: &str, password: &str) -> std::result::Result<Identity, AuthError> {
        let accounts = self.accounts.read();
        match accounts.get(email) {
            Some(account) if account.password == password => Ok(account.identity.clone()),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    fn register(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> std::result::Result<Identity, AuthError> {
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let mut accounts = self.accounts.write();
        if accounts.contains_key(email) {
            return Err(AuthError::EmailInUse);
        }

        let uid = format!("user-{}", self.next_uid.fetch_add(1, Ordering::SeqCst));
        let identity = Identity::new(uid, display_name);
        accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        Ok(identity)
    }

    fn logout(&self) -> std::result::Result<(), AuthError> {
        Ok(())
    }
}
