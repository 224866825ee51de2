//! Main client tying the session, feeds and interactions together.

use crate::activity::ActivityFeed;
use crate::backend::{AuthService, DocumentStore, MemoryAuth, MemoryStore};
use crate::error::{FeedError, Result};
use crate::feed::{FeedScope, FeedSubscription};
use crate::interactions::{EngineConfig, InteractionEngine};
use crate::session::{ProfileUpdate, SessionConfig, SessionStore};
use crate::subscriptions::SubscriptionConfig;
use crate::types::{Identity, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Client configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Buffering for live queries served by an in-process store.
    pub subscriptions: SubscriptionConfig,
    pub engine: EngineConfig,
    pub session: SessionConfig,
}

impl ClientConfig {
    /// Parse from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FeedError::Deserialization(e.to_string()))
    }
}

/// The feed client.
///
/// Provides a unified interface for:
/// - Signing in and out
/// - Opening live feeds and the activity inbox
/// - Liking, commenting and managing one's own posts
pub struct FeedClient {
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthService>,
    session: Arc<SessionStore>,
    engine: InteractionEngine,
}

impl FeedClient {
    /// Build a client over the given services, restoring any persisted
    /// session.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthService>,
        config: ClientConfig,
    ) -> Result<Self> {
        let session = Arc::new(SessionStore::restore(config.session)?);
        let engine = InteractionEngine::new(Arc::clone(&store), Arc::clone(&session), config.engine);
        Ok(Self {
            store,
            auth,
            session,
            engine,
        })
    }

    /// Client over an in-process store and auth service.
    pub fn in_memory(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::with_config(config.subscriptions.clone()));
        Self::new(store, Arc::new(MemoryAuth::new()), config)
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Interactions on behalf of the signed-in user.
    pub fn engine(&mut self) -> &mut InteractionEngine {
        &mut self.engine
    }

    // --- Session ---

    pub fn login(&self, email: &str, password: &str) -> Result<Identity> {
        self.session.login(self.auth.as_ref(), email, password)
    }

    /// Create an account, sign in as it and publish its profile to the user
    /// directory.
    pub fn register(&self, email: &str, password: &str, display_name: &str) -> Result<Identity> {
        let identity = self
            .session
            .register(self.auth.as_ref(), email, password, display_name)?;
        self.publish_profile(&identity)?;
        Ok(identity)
    }

    pub fn logout(&self) -> Result<()> {
        self.session.logout(self.auth.as_ref())
    }

    /// Edit the signed-in profile and push the result to the user directory.
    pub fn update_profile(&self, update: ProfileUpdate) -> Result<Identity> {
        let identity = self.session.update_profile(update)?;
        self.publish_profile(&identity)?;
        Ok(identity)
    }

    /// Public profile of any user, as stored in the directory.
    pub fn user_profile(&self, id: &UserId) -> Result<Option<Identity>> {
        self.store.get_user(id)
    }

    fn publish_profile(&self, identity: &Identity) -> Result<()> {
        self.store.upsert_user(identity).map_err(|e| {
            warn!(user = %identity.id, error = %e, "profile not stored in directory");
            e
        })
    }

    // --- Live views ---

    /// Every post, newest first.
    pub fn home_feed(&self) -> Result<FeedSubscription> {
        FeedSubscription::open(Arc::clone(&self.store), FeedScope::Global)
    }

    /// Posts of one author, newest first.
    pub fn user_feed(&self, author: &Identity) -> Result<FeedSubscription> {
        FeedSubscription::open(Arc::clone(&self.store), FeedScope::Author(author.id.clone()))
    }

    /// The signed-in user's own posts.
    pub fn my_feed(&self) -> Result<FeedSubscription> {
        let viewer = self.session.require()?;
        self.user_feed(&viewer)
    }

    /// Activities addressed to the signed-in user.
    pub fn activity_inbox(&self) -> Result<ActivityFeed> {
        let viewer = self.session.require()?;
        ActivityFeed::open(Arc::clone(&self.store), viewer.id)
    }

    /// Reconcile the engine with a feed's latest snapshot after polling it.
    ///
    /// A global snapshot lists every post, so posts the engine knows that are
    /// missing from it have been deleted and are forgotten.
    pub fn sync(&mut self, feed: &mut FeedSubscription) -> Result<bool> {
        let updated = feed.poll()?;
        if updated {
            match feed.scope() {
                FeedScope::Global => self.engine.observe_all(feed.posts()),
                _ => self.engine.observe(feed.posts()),
            }
        }
        Ok(updated)
    }

    /// Users whose display name starts with `prefix`.
    pub fn search_users(&self, prefix: &str) -> Result<Vec<Identity>> {
        self.store.search_users(prefix.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json_defaults() {
        let config = ClientConfig::from_json(r#"{"engine": {"cascade_comment_delete": false}}"#)
            .unwrap();
        assert!(!config.engine.cascade_comment_delete);
        assert!(config.engine.rollback_on_write_failure);
        assert_eq!(config.engine.max_content_chars, Some(500));
        assert_eq!(config.subscriptions.buffer_size, 64);
        assert!(config.session.persist_path.is_none());

        assert!(ClientConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_my_feed_requires_session() {
        let client = FeedClient::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuth::new()),
            ClientConfig::default(),
        )
        .unwrap();

        assert!(matches!(client.my_feed(), Err(FeedError::NotAuthenticated)));
        assert!(matches!(
            client.activity_inbox(),
            Err(FeedError::NotAuthenticated)
        ));
    }
}
