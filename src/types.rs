//! Core types for the feed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_id!(
    /// Opaque identifier of a post document.
    PostId
);
string_id!(
    /// Opaque identifier of a comment inside a post's comment collection.
    CommentId
);
string_id!(
    /// Identity assigned by the authentication service.
    UserId
);
string_id!(ActivityId);

/// Generate a document id the way hosted document stores do: 20 hex chars,
/// unique per collection and counter.
pub fn generate_document_id(collection: &str, counter: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(collection.as_bytes());
    hasher.update(counter.to_le_bytes());
    hasher.update(Timestamp::now().0.to_le_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..10])
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or(0);
        Timestamp(micros)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// The signed-in user as seen by the feed.
///
/// Owned by the authentication service; read-only for the rest of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(rename = "uid")]
    pub id: UserId,
    pub display_name: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId(id.into()),
            display_name: display_name.into(),
            photo_url: None,
            bio: None,
            link: None,
        }
    }

    pub fn with_photo(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Author reference stamped onto posts and comments this identity writes.
    pub fn author_ref(&self) -> AuthorRef {
        AuthorRef {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// Denormalized author fields stored with each post and comment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(rename = "userId")]
    pub id: UserId,
    #[serde(rename = "userDisplayName")]
    pub display_name: String,
    #[serde(rename = "userPhotoURL", default)]
    pub photo_url: Option<String>,
}

/// A post as last reported by the backing store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub author: AuthorRef,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Users who liked the post. A set, so an identity appears at most once.
    #[serde(default)]
    pub likes: BTreeSet<UserId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Post {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }
}

/// Input for creating a new post (before id and timestamps are assigned).
#[derive(Clone, Debug)]
pub struct NewPost {
    pub author: AuthorRef,
    pub content: String,
    pub image_url: Option<String>,
}

/// A comment in a post's comment collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author: AuthorRef,
    pub content: String,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug)]
pub struct NewComment {
    pub author: AuthorRef,
    pub content: String,
}

/// What kind of interaction an activity describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Like,
    Comment,
    Follow,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Like => f.write_str("like"),
            ActivityKind::Comment => f.write_str("comment"),
            ActivityKind::Follow => f.write_str("follow"),
        }
    }
}

/// Append-only notification record derived from an interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: ActivityId,
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    /// User the notification is delivered to.
    #[serde(rename = "userId")]
    pub target_user: UserId,
    #[serde(rename = "byUserId")]
    pub actor_id: UserId,
    #[serde(rename = "byUser")]
    pub actor_display_name: String,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub content: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Clone, Debug)]
pub struct NewActivity {
    pub kind: ActivityKind,
    pub target_user: UserId,
    pub actor_id: UserId,
    pub actor_display_name: String,
    pub post_id: Option<PostId>,
    pub content: Option<String>,
}

/// Anything a live view orders newest-first.
pub trait Chronological {
    fn created_at(&self) -> Timestamp;
}

impl Chronological for Post {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Chronological for Comment {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

impl Chronological for Activity {
    fn created_at(&self) -> Timestamp {
        self.created_at
    }
}

/// Stable newest-first sort. Equal timestamps keep their incoming order.
pub fn sort_newest_first<T: Chronological>(items: &mut [T]) {
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
}
