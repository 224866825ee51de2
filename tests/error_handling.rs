//! Error handling tests: rejected input, ownership, backend failures and
//! closed subscriptions.

use std::sync::Arc;
use std::time::Duration;
use threadline::{
    AuthError, ClientConfig, CommentId, DocumentStore, EngineConfig, FeedClient, FeedError,
    FeedScope, FeedSubscription, Identity, LiveStream, MemoryAuth, MemoryStore, NewPost, Post,
    PostId,
};

fn seeded() -> (Arc<MemoryStore>, FeedClient, Post) {
    let store = Arc::new(MemoryStore::new());
    let post = store
        .create_post(NewPost {
            author: Identity::new("author", "Author").author_ref(),
            content: "hello".into(),
            image_url: None,
        })
        .unwrap();
    let client = FeedClient::new(
        store.clone(),
        Arc::new(MemoryAuth::new()),
        ClientConfig::default(),
    )
    .unwrap();
    (store, client, post)
}

// --- Validation ---

#[test]
fn test_unauthenticated_comment_writes_nothing() {
    let (store, mut client, post) = seeded();
    let writes = store.write_attempts();

    let err = client.engine().create_comment(&post.id, "hi").unwrap_err();
    assert!(matches!(err, FeedError::NotAuthenticated));
    assert!(!err.is_retryable());
    assert_eq!(store.write_attempts(), writes);
    assert_eq!(store.comment_count(&post.id), 0);
}

#[test]
fn test_unauthenticated_like_leaves_state_alone() {
    let (store, mut client, post) = seeded();
    client.engine().observe(&[post.clone()]);

    assert!(matches!(
        client.engine().toggle_like(&post.id),
        Err(FeedError::NotAuthenticated)
    ));
    assert_eq!(client.engine().like_count(&post.id), Some(0));
    assert!(store.activities().is_empty());
}

#[test]
fn test_content_limits() {
    let (store, mut client, post) = seeded();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
    let writes = store.write_attempts();

    let err = client.engine().create_post("", None).unwrap_err();
    assert!(err.is_validation());

    let err = client
        .engine()
        .create_comment(&post.id, &"é".repeat(501))
        .unwrap_err();
    assert!(matches!(err, FeedError::ContentTooLong { len: 501, max: 500 }));
    assert!(err.user_message().contains("500"));

    // 500 multi-byte characters are within the limit.
    client
        .engine()
        .create_comment(&post.id, &"é".repeat(500))
        .unwrap();
    assert_eq!(store.write_attempts(), writes + 2); // comment + activity
}

#[test]
fn test_unlimited_content_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig {
        engine: EngineConfig {
            max_content_chars: None,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut client = FeedClient::new(store, Arc::new(MemoryAuth::new()), config).unwrap();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();

    let post = client.engine().create_post(&"x".repeat(5000), None).unwrap();
    assert_eq!(post.content.len(), 5000);
}

// --- Ownership ---

#[test]
fn test_non_author_edit_is_rejected_without_write() {
    let (store, mut client, post) = seeded();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
    let writes = store.write_attempts();

    match client.engine().edit_post(&post.id, "defaced") {
        Err(FeedError::NotOwner { actor, resource }) => {
            assert_eq!(actor.as_str(), "u1");
            assert!(resource.contains(post.id.as_str()));
        }
        other => panic!("expected NotOwner, got {:?}", other),
    }
    assert_eq!(store.write_attempts(), writes);
    assert_eq!(store.get_post(&post.id).unwrap().unwrap().content, "hello");
}

#[test]
fn test_missing_targets() {
    let (_store, mut client, post) = seeded();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();

    let missing = PostId::from("nope");
    assert!(matches!(
        client.engine().toggle_like(&missing),
        Err(FeedError::PostNotFound(id)) if id == missing
    ));
    assert!(matches!(
        client.engine().create_comment(&missing, "hi"),
        Err(FeedError::PostNotFound(_))
    ));
    assert!(matches!(
        client
            .engine()
            .delete_comment(&post.id, &CommentId::from("nope")),
        Err(FeedError::CommentNotFound(_))
    ));
}

// --- Backend failures ---

#[test]
fn test_failed_like_is_rolled_back() {
    let (store, mut client, post) = seeded();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
    client.engine().observe(&[post.clone()]);

    store.fail_next_writes(1, "network unreachable");
    let err = client.engine().toggle_like(&post.id).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(client.engine().like_count(&post.id), Some(0));
    assert!(!client.engine().is_liked(&post.id));
    assert!(store.activities().is_empty());

    // The retry goes through.
    let outcome = client.engine().toggle_like(&post.id).unwrap();
    assert!(outcome.liked);
    assert_eq!(store.get_post(&post.id).unwrap().unwrap().like_count(), 1);
}

#[test]
fn test_failed_like_kept_without_rollback() {
    let store = Arc::new(MemoryStore::new());
    let config = ClientConfig {
        engine: EngineConfig {
            rollback_on_write_failure: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut client = FeedClient::new(store.clone(), Arc::new(MemoryAuth::new()), config).unwrap();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
    let post = client.engine().create_post("hello", None).unwrap();

    store.fail_next_writes(1, "network unreachable");
    assert!(client.engine().toggle_like(&post.id).is_err());

    // Local state diverges until the next snapshot is observed.
    assert_eq!(client.engine().like_count(&post.id), Some(1));
    let stored = store.get_post(&post.id).unwrap().unwrap();
    assert_eq!(stored.like_count(), 0);
    client.engine().observe(&[stored]);
    assert_eq!(client.engine().like_count(&post.id), Some(0));
}

#[test]
fn test_failed_delete_keeps_post() {
    let (store, mut client, _) = seeded();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
    let post = client.engine().create_post("mine", None).unwrap();

    store.fail_next_op("delete_post", "permission denied");
    assert!(matches!(
        client.engine().delete_post(&post.id),
        Err(FeedError::Backend(_))
    ));
    assert!(store.get_post(&post.id).unwrap().is_some());
    assert_eq!(client.engine().like_count(&post.id), Some(0));
}

// --- Subscriptions ---

#[test]
fn test_scripted_feed_cannot_rescope() {
    let (_tx, stream) = LiveStream::<Vec<Post>>::scripted(4);
    let mut feed = FeedSubscription::from_stream(FeedScope::Global, stream);

    feed.close();
    assert!(!feed.is_active());
    assert!(matches!(
        feed.set_scope(FeedScope::Author("u1".into())),
        Err(FeedError::SubscriptionClosed)
    ));
    assert!(matches!(
        feed.wait(Duration::from_millis(5)),
        Err(FeedError::SubscriptionClosed)
    ));
}

#[test]
fn test_poll_collapsed_panel() {
    let (_store, mut client, post) = seeded();
    assert!(matches!(
        client.engine().poll_comments(&post.id),
        Err(FeedError::SubscriptionClosed)
    ));
}

// --- Authentication ---

#[test]
fn test_auth_errors() {
    let (_store, client, _) = seeded();

    let err = client.register("ada@example.com", "123", "Ada").unwrap_err();
    assert!(matches!(err, FeedError::Auth(AuthError::WeakPassword)));
    assert!(!client.session().is_signed_in());

    client.register("ada@example.com", "hunter22", "Ada").unwrap();
    let err = client
        .register("ada@example.com", "hunter22", "Ada again")
        .unwrap_err();
    assert!(matches!(err, FeedError::Auth(AuthError::EmailInUse)));

    client.logout().unwrap();
    let err = client.login("ada@example.com", "wrong").unwrap_err();
    assert!(matches!(err, FeedError::Auth(AuthError::InvalidCredentials)));
    assert!(!err.user_message().is_empty());
    assert!(!client.session().is_signed_in());
}

#[test]
fn test_error_display() {
    let err = FeedError::NotOwner {
        actor: "u2".into(),
        resource: "comment c1".into(),
    };
    assert!(err.to_string().contains("c1"));
    assert!(!err.is_retryable());

    let err: FeedError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
    assert!(matches!(err, FeedError::Io(_)));
    assert!(err.is_retryable());
}
