// The per-platform crawling capability and its registry.
//
// One `Crawler` per platform, registered at startup. The orchestrator only
// ever sees the trait, which keeps platform adapters swappable and lets
// tests run against a scripted mock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use followfeed_common::{FetchedPage, FollowFeedError, Profile, Result};

#[async_trait]
pub trait Crawler: Send + Sync {
    /// Fetch the account's profile fields. Absent fields come back `None`.
    async fn fetch_user_profile(&self, profile_url: &str) -> Result<Profile>;

    /// Fetch posts newer than `since_cursor`, newest→oldest.
    ///
    /// The cursor is the native id of a previously-seen post and is an
    /// exclusive boundary: the boundary post itself is not returned. An
    /// empty cursor means bootstrap — exactly one page, no further paging.
    /// The returned `next_cursor` is the native id of the newest post
    /// observed in this call (bootstrap included), or the input cursor
    /// unchanged when nothing was observed.
    async fn fetch_latest_posts(&self, profile_url: &str, since_cursor: &str)
        -> Result<FetchedPage>;

    /// Replace the adapter's credential. Idempotent and safe under
    /// concurrent calls; serialization is the credential broker's job.
    async fn refresh_credential(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn Crawler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Crawler")
    }
}

/// Immutable platform → crawler mapping, populated at startup.
#[derive(Default)]
pub struct CrawlerRegistry {
    crawlers: HashMap<String, Arc<dyn Crawler>>,
}

impl CrawlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, platform: &str, crawler: Arc<dyn Crawler>) {
        self.crawlers.insert(platform.to_string(), crawler);
    }

    pub fn get(&self, platform: &str) -> Result<Arc<dyn Crawler>> {
        self.crawlers
            .get(platform)
            .cloned()
            .ok_or_else(|| FollowFeedError::UnknownPlatform(platform.to_string()))
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.crawlers.keys().map(String::as_str)
    }

    /// Kick a credential refresh on every registered adapter. Failures are
    /// logged per platform and do not stop the remaining refreshes.
    pub async fn refresh_all(&self) {
        for (platform, crawler) in &self.crawlers {
            if let Err(e) = crawler.refresh_credential().await {
                warn!(platform = platform.as_str(), error = %e, "Credential refresh failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCrawler;

    #[test]
    fn unknown_platform_is_an_error() {
        let registry = CrawlerRegistry::new();
        let err = registry.get("xiaohongshu").unwrap_err();
        assert!(matches!(err, FollowFeedError::UnknownPlatform(p) if p == "xiaohongshu"));
    }

    #[test]
    fn registered_platform_resolves() {
        let mut registry = CrawlerRegistry::new();
        registry.register("xiaohongshu", Arc::new(MockCrawler::new()));
        assert!(registry.get("xiaohongshu").is_ok());
        assert_eq!(registry.platforms().count(), 1);
    }

    #[tokio::test]
    async fn refresh_all_touches_every_adapter() {
        use std::sync::atomic::Ordering;

        let first = Arc::new(MockCrawler::new());
        let second = Arc::new(MockCrawler::new());

        let mut registry = CrawlerRegistry::new();
        registry.register("xiaohongshu", first.clone());
        registry.register("weibo", second.clone());
        registry.refresh_all().await;

        assert_eq!(first.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.refresh_calls.load(Ordering::SeqCst), 1);
    }
}
