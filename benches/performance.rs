//! Performance benchmarks for feeds and interactions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::collections::BTreeSet;
use std::sync::Arc;
use threadline::{
    DocumentStore, EngineConfig, FeedClient, FeedScope, FeedSubscription, Identity,
    InteractionEngine, LiveEvent, LiveStream, MemoryStore, NewPost, Post, PostId, SessionStore,
    Timestamp, UserId,
};

fn posts(count: usize) -> Vec<Post> {
    (0..count)
        .map(|i| Post {
            id: PostId::new(format!("p{}", i)),
            author: Identity::new(format!("u{}", i % 10), "Someone").author_ref(),
            content: format!("post number {}", i),
            image_url: None,
            likes: BTreeSet::new(),
            // Scrambled so sorting has work to do
            created_at: Timestamp(((i * 7919) % count) as i64),
            updated_at: Timestamp(0),
        })
        .collect()
}

/// Benchmark applying a snapshot to a scoped feed
fn bench_snapshot_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_apply");

    for size in [10, 100, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("posts", size), &size, |b, &size| {
            let snapshot = posts(size);
            let (tx, stream) = LiveStream::scripted(1);
            let mut feed = FeedSubscription::from_stream(FeedScope::Author(UserId::from("u3")), stream);

            b.iter(|| {
                tx.send(LiveEvent::Snapshot(snapshot.clone())).unwrap();
                black_box(feed.poll().unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark a live feed receiving writes from the in-memory store
fn bench_live_feed(c: &mut Criterion) {
    let mut group = c.benchmark_group("live_feed");

    for existing in [10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("existing_posts", existing),
            &existing,
            |b, &existing| {
                let mut client = FeedClient::in_memory(Default::default()).unwrap();
                client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
                for i in 0..existing {
                    client
                        .engine()
                        .create_post(&format!("seed {}", i), None)
                        .unwrap();
                }
                let mut feed = client.home_feed().unwrap();

                b.iter(|| {
                    client.engine().create_post("fresh", None).unwrap();
                    black_box(client.sync(&mut feed).unwrap());
                });
            },
        );
    }

    group.finish();
}

/// Benchmark optimistic like toggles with activity recording
fn bench_toggle_like(c: &mut Criterion) {
    let store = Arc::new(MemoryStore::new());
    let post = store
        .create_post(NewPost {
            author: Identity::new("author", "Author").author_ref(),
            content: "hello".into(),
            image_url: None,
        })
        .unwrap();
    let session = Arc::new(SessionStore::default());
    session.sign_in(Identity::new("u1", "Ada")).unwrap();
    let mut engine = InteractionEngine::new(store.clone(), session, EngineConfig::default());

    c.bench_function("toggle_like", |b| {
        b.iter(|| {
            black_box(engine.toggle_like(&post.id).unwrap());
        });
    });
}

/// Benchmark comment writes while the post's panel is expanded
fn bench_comment_panel(c: &mut Criterion) {
    let mut client = FeedClient::in_memory(Default::default()).unwrap();
    client.session().sign_in(Identity::new("u1", "Ada")).unwrap();
    let post = client.engine().create_post("hello", None).unwrap();
    client.engine().expand_comments(&post.id).unwrap();

    c.bench_function("comment_with_panel", |b| {
        b.iter(|| {
            client.engine().create_comment(&post.id, "nice").unwrap();
            black_box(client.engine().poll_comments(&post.id).unwrap().len());
        });
    });
}

criterion_group!(
    benches,
    bench_snapshot_apply,
    bench_live_feed,
    bench_toggle_like,
    bench_comment_panel
);

criterion_main!(benches);
