// End-to-end orchestrator and scheduler behavior over the in-memory store
// and scripted crawlers: idempotent materialization, cursor handling,
// partial profile updates, error propagation, and sweep isolation.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use followfeed_common::{FetchedPage, FollowFeedError, FollowedUser, Post, Profile};
use followfeed_store::{FollowStore, MemoryFollowStore};
use followfeed_sync::scheduler::{run_sweep, SweepKind};
use followfeed_sync::testing::MockCrawler;
use followfeed_sync::{CrawlerRegistry, SyncService};

fn post(business_id: &str) -> Post {
    Post {
        business_id: business_id.to_string(),
        title: format!("title {business_id}"),
        content: String::new(),
        original_url: format!("https://www.xiaohongshu.com/explore/{business_id}"),
        posted_at: Utc::now(),
    }
}

fn page(posts: Vec<Post>, next_cursor: &str) -> FetchedPage {
    FetchedPage {
        posts,
        next_cursor: next_cursor.to_string(),
    }
}

fn user(platform: &str) -> FollowedUser {
    FollowedUser {
        id: Uuid::new_v4(),
        platform: platform.to_string(),
        profile_url: "u1".to_string(),
        followed_at: Utc::now(),
        name: None,
        username: None,
        avatar: None,
        sync_cursor: None,
    }
}

fn service_with(
    store: Arc<MemoryFollowStore>,
    platform: &str,
    crawler: MockCrawler,
) -> SyncService {
    let mut registry = CrawlerRegistry::new();
    registry.register(platform, Arc::new(crawler));
    SyncService::new(store, Arc::new(registry))
}

#[tokio::test]
async fn bootstrap_feed_sync_materializes_posts_and_cursor() {
    let store = Arc::new(MemoryFollowStore::new());
    let u = user("xiaohongshu");
    store.seed_user(u.clone());

    let crawler = MockCrawler::new()
        .with_page("", page(vec![post("xhs-1"), post("xhs-2")], "cursor-1"));
    let service = service_with(store.clone(), "xiaohongshu", crawler);

    service.sync_user_feeds(u.id).await.unwrap();

    let items = store.list_feed_items_for_author(u.id).await.unwrap();
    assert_eq!(items.len(), 2);
    for item in &items {
        assert_eq!(item.platform, "xiaohongshu");
        assert_eq!(item.author.user_id, u.id);
    }

    let stored = store.get_followed_user(u.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("cursor-1"));
}

#[tokio::test]
async fn reingesting_seen_ids_is_idempotent() {
    let store = Arc::new(MemoryFollowStore::new());
    let u = user("xiaohongshu");
    store.seed_user(u.clone());

    // The incremental page overlaps the bootstrap page entirely plus one
    // new post.
    let crawler = MockCrawler::new()
        .with_page("", page(vec![post("xhs-1"), post("xhs-2")], "cursor-1"))
        .with_page(
            "cursor-1",
            page(vec![post("xhs-3"), post("xhs-1"), post("xhs-2")], "cursor-2"),
        );
    let service = service_with(store.clone(), "xiaohongshu", crawler);

    service.sync_user_feeds(u.id).await.unwrap();
    assert_eq!(store.feed_item_count(), 2);

    service.sync_user_feeds(u.id).await.unwrap();
    assert_eq!(store.feed_item_count(), 3, "duplicates must not add rows");

    let stored = store.get_followed_user(u.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("cursor-2"));
}

#[tokio::test]
async fn persisted_cursor_equals_adapter_cursor_exactly() {
    let store = Arc::new(MemoryFollowStore::new());
    let u = user("xiaohongshu");
    store.seed_user(u.clone());

    let crawler = MockCrawler::new().with_page("", page(vec![], "  cursor-with-spaces  "));
    let service = service_with(store.clone(), "xiaohongshu", crawler);

    service.sync_user_feeds(u.id).await.unwrap();

    let stored = store.get_followed_user(u.id).await.unwrap().unwrap();
    assert_eq!(stored.sync_cursor.as_deref(), Some("  cursor-with-spaces  "));
}

#[tokio::test]
async fn author_snapshot_is_immutable_after_ingestion() {
    let store = Arc::new(MemoryFollowStore::new());
    let mut u = user("xiaohongshu");
    u.name = Some("Original Name".to_string());
    store.seed_user(u.clone());

    let crawler = MockCrawler::new()
        .with_page("", page(vec![post("xhs-1")], "cursor-1"))
        .with_profile(Profile {
            name: Some("Renamed".to_string()),
            username: None,
            avatar: None,
        });
    let service = service_with(store.clone(), "xiaohongshu", crawler);

    service.sync_user_feeds(u.id).await.unwrap();
    service.sync_user_profile(u.id).await.unwrap();

    // Profile changed, but the already-written snapshot did not.
    let stored = store.get_followed_user(u.id).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Renamed"));
    let items = store.list_feed_items_for_author(u.id).await.unwrap();
    assert_eq!(items[0].author.name.as_deref(), Some("Original Name"));
}

#[tokio::test]
async fn profile_sync_never_nulls_previously_set_fields() {
    let store = Arc::new(MemoryFollowStore::new());
    let mut u = user("xiaohongshu");
    u.name = Some("Name".to_string());
    u.username = Some("handle".to_string());
    u.avatar = Some("https://example.com/a.jpg".to_string());
    store.seed_user(u.clone());

    // Platform response carries only a name this time.
    let crawler = MockCrawler::new().with_profile(Profile {
        name: Some("New Name".to_string()),
        username: None,
        avatar: None,
    });
    let service = service_with(store.clone(), "xiaohongshu", crawler);

    service.sync_user_profile(u.id).await.unwrap();

    let stored = store.get_followed_user(u.id).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("New Name"));
    assert_eq!(stored.username.as_deref(), Some("handle"));
    assert_eq!(stored.avatar.as_deref(), Some("https://example.com/a.jpg"));
}

#[tokio::test]
async fn adapter_error_propagates_with_exact_message_and_record_unchanged() {
    let store = Arc::new(MemoryFollowStore::new());
    let mut u = user("xiaohongshu");
    u.name = Some("Before".to_string());
    store.seed_user(u.clone());

    let crawler = MockCrawler::new().with_profile_error("Network error");
    let service = service_with(store.clone(), "xiaohongshu", crawler);

    let err = service.sync_user_profile(u.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Network error: Network error");
    assert!(matches!(err, FollowFeedError::Transport(m) if m == "Network error"));

    let stored = store.get_followed_user(u.id).await.unwrap().unwrap();
    assert_eq!(stored.name.as_deref(), Some("Before"));
}

#[tokio::test]
async fn unknown_user_is_not_found() {
    let store = Arc::new(MemoryFollowStore::new());
    let service = service_with(store, "xiaohongshu", MockCrawler::new());

    let missing = Uuid::new_v4();
    let err = service.sync_user_profile(missing).await.unwrap_err();
    assert!(matches!(err, FollowFeedError::NotFound(id) if id == missing));
}

#[tokio::test]
async fn unregistered_platform_is_an_error() {
    let store = Arc::new(MemoryFollowStore::new());
    let u = user("weibo");
    store.seed_user(u.clone());

    let service = service_with(store, "xiaohongshu", MockCrawler::new());
    let err = service.sync_user_feeds(u.id).await.unwrap_err();
    assert!(matches!(err, FollowFeedError::UnknownPlatform(p) if p == "weibo"));
}

#[tokio::test]
async fn one_failing_account_does_not_abort_the_sweep() {
    let store = Arc::new(MemoryFollowStore::new());
    let good = user("xiaohongshu");
    let bad = user("weibo");
    store.seed_user(good.clone());
    store.seed_user(bad.clone());

    let mut registry = CrawlerRegistry::new();
    registry.register(
        "xiaohongshu",
        Arc::new(MockCrawler::new().with_page("", page(vec![post("xhs-1")], "c1"))),
    );
    registry.register(
        "weibo",
        Arc::new(MockCrawler::new().with_posts_error("upstream down")),
    );
    let service = SyncService::new(store.clone(), Arc::new(registry));

    let stats = run_sweep(&service, store.as_ref(), SweepKind::Feed).await;
    assert_eq!(stats.synced, 1);
    assert_eq!(stats.failed, 1);

    // The healthy account still made progress.
    let items = store.list_feed_items_for_author(good.id).await.unwrap();
    assert_eq!(items.len(), 1);
}
