// Persistence collaborator for the sync engine.
//
// `FollowStore` is the seam the orchestrator and gateway depend on;
// `PgFollowStore` is the production Postgres implementation, and
// `MemoryFollowStore` (feature `test-support`) is a stateful in-memory
// implementation for deterministic tests.

pub mod pg;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use pg::PgFollowStore;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryFollowStore;

use async_trait::async_trait;
use uuid::Uuid;

use followfeed_common::{FeedItem, FollowedUser, NewFeedItem, Profile, Result};

#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Lookup a followed account by id.
    async fn get_followed_user(&self, id: Uuid) -> Result<Option<FollowedUser>>;

    /// All followed accounts, oldest first.
    async fn list_followed_users(&self) -> Result<Vec<FollowedUser>>;

    /// Follow a new account. Profile fields start unset.
    async fn add_followed_user(&self, platform: &str, profile_url: &str) -> Result<FollowedUser>;

    /// Unfollow. Returns whether a record was removed.
    async fn remove_followed_user(&self, id: Uuid) -> Result<bool>;

    /// Write profile fields onto a followed account. Partial: only fields
    /// that are `Some` in the patch are written; previously-set fields
    /// absent from the patch stay untouched.
    async fn update_profile(&self, id: Uuid, profile: &Profile) -> Result<()>;

    /// Overwrite the account's sync cursor with exactly this value.
    async fn set_sync_cursor(&self, id: Uuid, cursor: &str) -> Result<()>;

    /// Materialize a feed item, ignoring duplicates on
    /// `(platform, business_id)`. Returns whether a new row was inserted.
    async fn insert_feed_item(&self, item: &NewFeedItem) -> Result<bool>;

    /// Feed items authored by a followed account, newest first.
    async fn list_feed_items_for_author(&self, user_id: Uuid) -> Result<Vec<FeedItem>>;
}
