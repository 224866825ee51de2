//! Session store: who is signed in, and who wants to know.

use crate::backend::AuthService;
use crate::error::{FeedError, Result};
use crate::subscriptions::{LiveStream, SubscriptionConfig, SubscriptionManager};
use crate::types::Identity;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Session configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where to remember the signed-in identity between runs (None = memory only).
    pub persist_path: Option<PathBuf>,
}

/// Fields to change on the signed-in profile. `None` leaves a field as is.
#[derive(Clone, Debug, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub bio: Option<String>,
    pub link: Option<String>,
}

/// Holds the current identity and notifies watchers when it changes.
///
/// Shared by reference (`Arc<SessionStore>`) with every component that acts
/// on behalf of the user.
pub struct SessionStore {
    current: RwLock<Option<Identity>>,
    watchers: Arc<SubscriptionManager<(), Option<Identity>>>,
    config: SessionConfig,
}

impl SessionStore {
    /// Start signed out.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            current: RwLock::new(None),
            watchers: Arc::new(SubscriptionManager::new(SubscriptionConfig::default())),
            config,
        }
    }

    /// Start with the identity persisted by a previous run, if any.
    pub fn restore(config: SessionConfig) -> Result<Self> {
        let store = Self::new(config);
        if let Some(path) = &store.config.persist_path {
            match fs::read(path) {
                Ok(bytes) => {
                    let identity: Identity = serde_json::from_slice(&bytes)
                        .map_err(|e| FeedError::Deserialization(e.to_string()))?;
                    debug!(user = %identity.id, "restored session");
                    *store.current.write() = Some(identity);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(store)
    }

    pub fn current(&self) -> Option<Identity> {
        self.current.read().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.read().is_some()
    }

    /// The current identity, or `NotAuthenticated`.
    pub fn require(&self) -> Result<Identity> {
        self.current().ok_or(FeedError::NotAuthenticated)
    }

    /// Watch the identity. The stream yields the current value first, then
    /// every change.
    pub fn watch(&self) -> LiveStream<Option<Identity>> {
        let stream = self.watchers.subscribe(());
        self.watchers.send_to(stream.id(), self.current());
        stream
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.subscription_count()
    }

    /// Make `identity` the current user.
    pub fn sign_in(&self, identity: Identity) -> Result<()> {
        self.persist(Some(&identity))?;
        info!(user = %identity.id, "signed in");
        self.set(Some(identity));
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.persist(None)?;
        if let Some(previous) = self.current() {
            info!(user = %previous.id, "signed out");
        }
        self.set(None);
        Ok(())
    }

    /// Sign in through the authentication service.
    pub fn login(&self, auth: &dyn AuthService, email: &str, password: &str) -> Result<Identity> {
        let identity = auth.login(email, password).map_err(|e| {
            warn!(error = %e, "login failed");
            FeedError::Auth(e)
        })?;
        self.sign_in(identity.clone())?;
        Ok(identity)
    }

    /// Create an account and sign in as it.
    pub fn register(
        &self,
        auth: &dyn AuthService,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Identity> {
        let identity = auth.register(email, password, display_name)?;
        self.sign_in(identity.clone())?;
        Ok(identity)
    }

    pub fn logout(&self, auth: &dyn AuthService) -> Result<()> {
        auth.logout()?;
        self.sign_out()
    }

    /// Change profile fields of the signed-in identity.
    pub fn update_profile(&self, update: ProfileUpdate) -> Result<Identity> {
        let mut identity = self.require()?;
        if let Some(name) = update.display_name {
            identity.display_name = name;
        }
        if update.photo_url.is_some() {
            identity.photo_url = update.photo_url;
        }
        if update.bio.is_some() {
            identity.bio = update.bio;
        }
        if update.link.is_some() {
            identity.link = update.link;
        }

        self.persist(Some(&identity))?;
        self.set(Some(identity.clone()));
        Ok(identity)
    }

    fn set(&self, identity: Option<Identity>) {
        *self.current.write() = identity.clone();
        self.watchers.broadcast_with(|_| Some(identity.clone()));
    }

    fn persist(&self, identity: Option<&Identity>) -> Result<()> {
        let Some(path) = &self.config.persist_path else {
            return Ok(());
        };
        match identity {
            Some(identity) => fs::write(path, serde_json::to_vec(identity)?)?,
            None => match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}
