// In-memory FollowStore for deterministic tests: no network, no database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use followfeed_common::{FeedItem, FollowedUser, NewFeedItem, Profile, Result};

use crate::FollowStore;

#[derive(Default)]
struct State {
    users: HashMap<Uuid, FollowedUser>,
    // Keyed by (platform, business_id) to mirror the unique index.
    feed_items: HashMap<(String, String), FeedItem>,
}

#[derive(Default)]
pub struct MemoryFollowStore {
    state: Mutex<State>,
}

impl MemoryFollowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a followed user directly, bypassing `add_followed_user`.
    pub fn seed_user(&self, user: FollowedUser) {
        self.state.lock().unwrap().users.insert(user.id, user);
    }

    /// Total feed item count across all accounts.
    pub fn feed_item_count(&self) -> usize {
        self.state.lock().unwrap().feed_items.len()
    }
}

#[async_trait]
impl FollowStore for MemoryFollowStore {
    async fn get_followed_user(&self, id: Uuid) -> Result<Option<FollowedUser>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn list_followed_users(&self) -> Result<Vec<FollowedUser>> {
        let mut users: Vec<FollowedUser> =
            self.state.lock().unwrap().users.values().cloned().collect();
        users.sort_by_key(|u| u.followed_at);
        Ok(users)
    }

    async fn add_followed_user(&self, platform: &str, profile_url: &str) -> Result<FollowedUser> {
        let user = FollowedUser {
            id: Uuid::new_v4(),
            platform: platform.to_string(),
            profile_url: profile_url.to_string(),
            followed_at: Utc::now(),
            name: None,
            username: None,
            avatar: None,
            sync_cursor: None,
        };
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        Ok(user)
    }

    async fn remove_followed_user(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.lock().unwrap().users.remove(&id).is_some())
    }

    async fn update_profile(&self, id: Uuid, profile: &Profile) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(&id) {
            if let Some(ref name) = profile.name {
                user.name = Some(name.clone());
            }
            if let Some(ref username) = profile.username {
                user.username = Some(username.clone());
            }
            if let Some(ref avatar) = profile.avatar {
                user.avatar = Some(avatar.clone());
            }
        }
        Ok(())
    }

    async fn set_sync_cursor(&self, id: Uuid, cursor: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.get_mut(&id) {
            user.sync_cursor = Some(cursor.to_string());
        }
        Ok(())
    }

    async fn insert_feed_item(&self, item: &NewFeedItem) -> Result<bool> {
        let key = (item.platform.clone(), item.business_id.clone());
        let mut state = self.state.lock().unwrap();
        if state.feed_items.contains_key(&key) {
            return Ok(false);
        }
        state.feed_items.insert(
            key,
            FeedItem {
                id: Uuid::new_v4(),
                business_id: item.business_id.clone(),
                platform: item.platform.clone(),
                author: item.author.clone(),
                title: item.title.clone(),
                content: item.content.clone(),
                original_url: item.original_url.clone(),
                posted_at: item.posted_at,
                ingested_at: Utc::now(),
            },
        );
        Ok(true)
    }

    async fn list_feed_items_for_author(&self, user_id: Uuid) -> Result<Vec<FeedItem>> {
        let mut items: Vec<FeedItem> = self
            .state
            .lock()
            .unwrap()
            .feed_items
            .values()
            .filter(|i| i.author.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use followfeed_common::AuthorSnapshot;

    fn item(platform: &str, business_id: &str, author: Uuid) -> NewFeedItem {
        NewFeedItem {
            business_id: business_id.to_string(),
            platform: platform.to_string(),
            author: AuthorSnapshot {
                user_id: author,
                name: Some("name".into()),
                avatar: None,
                username: None,
            },
            title: "t".into(),
            content: "c".into(),
            original_url: "https://example.com/p".into(),
            posted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_ignored() {
        let store = MemoryFollowStore::new();
        let author = Uuid::new_v4();
        assert!(store.insert_feed_item(&item("xhs", "p-1", author)).await.unwrap());
        assert!(!store.insert_feed_item(&item("xhs", "p-1", author)).await.unwrap());
        assert_eq!(store.feed_item_count(), 1);
    }

    #[tokio::test]
    async fn same_business_id_different_platform_both_insert() {
        let store = MemoryFollowStore::new();
        let author = Uuid::new_v4();
        assert!(store.insert_feed_item(&item("xhs", "p-1", author)).await.unwrap());
        assert!(store.insert_feed_item(&item("weibo", "p-1", author)).await.unwrap());
        assert_eq!(store.feed_item_count(), 2);
    }

    #[tokio::test]
    async fn partial_profile_update_keeps_existing_fields() {
        let store = MemoryFollowStore::new();
        let user = store.add_followed_user("xhs", "https://example.com/u1").await.unwrap();

        store
            .update_profile(
                user.id,
                &Profile {
                    name: Some("Alice".into()),
                    username: Some("alice".into()),
                    avatar: Some("https://example.com/a.jpg".into()),
                },
            )
            .await
            .unwrap();

        // Second sync omits username and avatar.
        store
            .update_profile(
                user.id,
                &Profile {
                    name: Some("Alice Renamed".into()),
                    username: None,
                    avatar: None,
                },
            )
            .await
            .unwrap();

        let user = store.get_followed_user(user.id).await.unwrap().unwrap();
        assert_eq!(user.name.as_deref(), Some("Alice Renamed"));
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert_eq!(user.avatar.as_deref(), Some("https://example.com/a.jpg"));
    }
}
