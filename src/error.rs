//! Error types for the feed core.

use crate::types::{CommentId, PostId, UserId};
use thiserror::Error;

/// Main error type for feed and interaction operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Content is empty")]
    EmptyContent,

    #[error("Content is too long: {len} characters (max {max})")]
    ContentTooLong { len: usize, max: usize },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{actor} is not the author of {resource}")]
    NotOwner { actor: UserId, resource: String },

    #[error("Post not found: {0}")]
    PostNotFound(PostId),

    #[error("Comment not found: {0}")]
    CommentNotFound(CommentId),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Subscription closed")]
    SubscriptionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl FeedError {
    /// Rejected locally before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FeedError::EmptyContent
                | FeedError::ContentTooLong { .. }
                | FeedError::NotAuthenticated
                | FeedError::NotOwner { .. }
        )
    }

    /// Transport failures the user may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::Backend(_) | FeedError::SubscriptionClosed | FeedError::Io(_)
        ) || matches!(self, FeedError::Auth(AuthError::Unavailable(_)))
    }

    /// Message suitable for showing inline next to the action that failed.
    pub fn user_message(&self) -> String {
        match self {
            FeedError::EmptyContent => "Please write something first".to_string(),
            FeedError::ContentTooLong { max, .. } => {
                format!("Keep it under {} characters", max)
            }
            FeedError::NotAuthenticated => "You need to be logged in to do that".to_string(),
            FeedError::NotOwner { .. } => "You can only change your own posts".to_string(),
            FeedError::PostNotFound(_) => "This post no longer exists".to_string(),
            FeedError::CommentNotFound(_) => "This comment no longer exists".to_string(),
            FeedError::Auth(e) => e.to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// Classified failure from the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email is already registered")]
    EmailInUse,

    #[error("Password is too weak")]
    WeakPassword,

    #[error("Authentication service unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for FeedError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        FeedError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for FeedError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        FeedError::Deserialization(e.to_string())
    }
}

/// Result type for feed operations.
pub type Result<T> = std::result::Result<T, FeedError>;
