// Postgres persistence for followed accounts and feed items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use followfeed_common::{
    AuthorSnapshot, FeedItem, FollowFeedError, FollowedUser, NewFeedItem, Profile, Result,
};

use crate::FollowStore;

pub struct PgFollowStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct FollowedUserRow {
    id: Uuid,
    platform: String,
    profile_url: String,
    followed_at: DateTime<Utc>,
    name: Option<String>,
    username: Option<String>,
    avatar: Option<String>,
    sync_cursor: Option<String>,
}

impl From<FollowedUserRow> for FollowedUser {
    fn from(r: FollowedUserRow) -> Self {
        FollowedUser {
            id: r.id,
            platform: r.platform,
            profile_url: r.profile_url,
            followed_at: r.followed_at,
            name: r.name,
            username: r.username,
            avatar: r.avatar,
            sync_cursor: r.sync_cursor,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FeedItemRow {
    id: Uuid,
    business_id: String,
    platform: String,
    author_user_id: Uuid,
    author_name: Option<String>,
    author_avatar: Option<String>,
    author_username: Option<String>,
    title: String,
    content: String,
    original_url: String,
    posted_at: DateTime<Utc>,
    ingested_at: DateTime<Utc>,
}

impl From<FeedItemRow> for FeedItem {
    fn from(r: FeedItemRow) -> Self {
        FeedItem {
            id: r.id,
            business_id: r.business_id,
            platform: r.platform,
            author: AuthorSnapshot {
                user_id: r.author_user_id,
                name: r.author_name,
                avatar: r.author_avatar,
                username: r.author_username,
            },
            title: r.title,
            content: r.content,
            original_url: r.original_url,
            posted_at: r.posted_at,
            ingested_at: r.ingested_at,
        }
    }
}

fn db_err(e: sqlx::Error) -> FollowFeedError {
    FollowFeedError::Store(e.to_string())
}

impl PgFollowStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| FollowFeedError::Store(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl FollowStore for PgFollowStore {
    async fn get_followed_user(&self, id: Uuid) -> Result<Option<FollowedUser>> {
        let row = sqlx::query_as::<_, FollowedUserRow>(
            "SELECT * FROM followed_users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(FollowedUser::from))
    }

    async fn list_followed_users(&self) -> Result<Vec<FollowedUser>> {
        let rows = sqlx::query_as::<_, FollowedUserRow>(
            "SELECT * FROM followed_users ORDER BY followed_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(FollowedUser::from).collect())
    }

    async fn add_followed_user(&self, platform: &str, profile_url: &str) -> Result<FollowedUser> {
        let row = sqlx::query_as::<_, FollowedUserRow>(
            r#"
            INSERT INTO followed_users (platform, profile_url)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(platform)
        .bind(profile_url)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.into())
    }

    async fn remove_followed_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM followed_users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(&self, id: Uuid, profile: &Profile) -> Result<()> {
        // COALESCE keeps the stored value when the patch field is NULL, so a
        // platform response that omits a field never clears it.
        sqlx::query(
            r#"
            UPDATE followed_users
            SET name = COALESCE($2, name),
                username = COALESCE($3, username),
                avatar = COALESCE($4, avatar)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&profile.name)
        .bind(&profile.username)
        .bind(&profile.avatar)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn set_sync_cursor(&self, id: Uuid, cursor: &str) -> Result<()> {
        sqlx::query("UPDATE followed_users SET sync_cursor = $2 WHERE id = $1")
            .bind(id)
            .bind(cursor)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(())
    }

    async fn insert_feed_item(&self, item: &NewFeedItem) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO feed_items
                (business_id, platform, author_user_id, author_name,
                 author_avatar, author_username, title, content,
                 original_url, posted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (platform, business_id) DO NOTHING
            "#,
        )
        .bind(&item.business_id)
        .bind(&item.platform)
        .bind(item.author.user_id)
        .bind(&item.author.name)
        .bind(&item.author.avatar)
        .bind(&item.author.username)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.original_url)
        .bind(item.posted_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_feed_items_for_author(&self, user_id: Uuid) -> Result<Vec<FeedItem>> {
        let rows = sqlx::query_as::<_, FeedItemRow>(
            r#"
            SELECT * FROM feed_items
            WHERE author_user_id = $1
            ORDER BY posted_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(rows.into_iter().map(FeedItem::from).collect())
    }
}
