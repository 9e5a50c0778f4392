// Sync orchestrator: drives profile sync and incremental feed sync for one
// followed account. Errors are logged at their origin and propagated
// unchanged; there is no internal retry.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use followfeed_common::{AuthorSnapshot, FollowFeedError, FollowedUser, NewFeedItem, Result};
use followfeed_store::FollowStore;

use crate::crawler::CrawlerRegistry;

#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn FollowStore>,
    crawlers: Arc<CrawlerRegistry>,
}

impl SyncService {
    pub fn new(store: Arc<dyn FollowStore>, crawlers: Arc<CrawlerRegistry>) -> Self {
        Self { store, crawlers }
    }

    async fn load_user(&self, user_id: Uuid) -> Result<FollowedUser> {
        self.store
            .get_followed_user(user_id)
            .await?
            .ok_or(FollowFeedError::NotFound(user_id))
    }

    /// Refresh the account's profile fields from the platform. Fields the
    /// platform omits stay untouched.
    pub async fn sync_user_profile(&self, user_id: Uuid) -> Result<()> {
        let user = self.load_user(user_id).await?;
        let crawler = self.crawlers.get(&user.platform)?;

        let profile = match crawler.fetch_user_profile(&user.profile_url).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, platform = user.platform.as_str(), error = %e,
                    "Profile fetch failed");
                return Err(e);
            }
        };

        self.store.update_profile(user_id, &profile).await?;
        info!(user_id = %user_id, platform = user.platform.as_str(), "Profile synced");
        Ok(())
    }

    /// Incrementally ingest the account's feed from its sync cursor
    /// (bootstrap when unset), then persist the adapter-reported cursor.
    pub async fn sync_user_feeds(&self, user_id: Uuid) -> Result<()> {
        let user = self.load_user(user_id).await?;
        let crawler = self.crawlers.get(&user.platform)?;
        let cursor = user.sync_cursor.clone().unwrap_or_default();

        let page = match crawler.fetch_latest_posts(&user.profile_url, &cursor).await {
            Ok(page) => page,
            Err(e) => {
                warn!(user_id = %user_id, platform = user.platform.as_str(), error = %e,
                    "Feed fetch failed");
                return Err(e);
            }
        };

        // Author identity is captured from the profile fields as they are
        // right now; the snapshot on a feed item never changes afterwards.
        let author = AuthorSnapshot {
            user_id: user.id,
            name: user.name.clone(),
            avatar: user.avatar.clone(),
            username: user.username.clone(),
        };

        let mut inserted = 0usize;
        for post in &page.posts {
            let item = NewFeedItem {
                business_id: post.business_id.clone(),
                platform: user.platform.clone(),
                author: author.clone(),
                title: post.title.clone(),
                content: post.content.clone(),
                original_url: post.original_url.clone(),
                posted_at: post.posted_at,
            };
            if self.store.insert_feed_item(&item).await? {
                inserted += 1;
            } else {
                debug!(business_id = post.business_id.as_str(), "Feed item already materialized");
            }
        }

        self.store.set_sync_cursor(user_id, &page.next_cursor).await?;

        info!(
            user_id = %user_id,
            platform = user.platform.as_str(),
            fetched = page.posts.len(),
            inserted,
            cursor = page.next_cursor.as_str(),
            "Feed sync complete"
        );
        Ok(())
    }
}
