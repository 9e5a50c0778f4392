use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Followed accounts ---

/// An account the system follows on some platform. Created by an external
/// follow action; the sync engine only ever mutates its profile fields and
/// `sync_cursor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowedUser {
    pub id: Uuid,
    /// Platform identifier, e.g. "xiaohongshu". Keys the crawler registry.
    pub platform: String,
    pub profile_url: String,
    pub followed_at: DateTime<Utc>,
    /// Display name. Populated only after a successful profile sync.
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    /// Opaque forward-progress marker for incremental feed sync.
    /// None until the first feed sync completes.
    pub sync_cursor: Option<String>,
}

/// Profile fields as returned by a platform. Absent fields stay `None` and
/// must never overwrite a previously-synced value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

// --- Posts and feed items ---

/// A post as observed by a crawler. Transient: normalized into a `FeedItem`
/// before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Platform-unique id, e.g. "xhs-<note_id>".
    pub business_id: String,
    pub title: String,
    pub content: String,
    pub original_url: String,
    pub posted_at: DateTime<Utc>,
}

/// One `fetch_latest_posts` result: posts ordered newest→oldest, plus the
/// cursor to persist for the next incremental call.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub posts: Vec<Post>,
    pub next_cursor: String,
}

/// Author identity denormalized onto a feed item at ingestion time.
/// Immutable once written, even if the source profile later changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub username: Option<String>,
}

/// A materialized feed entry. Unique on `(platform, business_id)`; created
/// once and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: Uuid,
    pub business_id: String,
    pub platform: String,
    pub author: AuthorSnapshot,
    pub title: String,
    pub content: String,
    pub original_url: String,
    pub posted_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}

/// Parameters for materializing a feed item.
#[derive(Debug, Clone)]
pub struct NewFeedItem {
    pub business_id: String,
    pub platform: String,
    pub author: AuthorSnapshot,
    pub title: String,
    pub content: String,
    pub original_url: String,
    pub posted_at: DateTime<Utc>,
}

// --- Browser session state ---

/// Durable serialized session state enabling credential reacquisition
/// without an interactive login. Overwritten wholesale on each successful
/// acquisition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub cookies: Vec<SessionCookie>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_storage: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_storage: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl SessionSnapshot {
    /// Serialize cookies to the `name=value; name=value` form used as the
    /// outbound credential string.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_joins_pairs() {
        let snapshot = SessionSnapshot {
            cookies: vec![
                SessionCookie {
                    name: "a1".into(),
                    value: "x".into(),
                    domain: ".example.com".into(),
                    path: "/".into(),
                    expires: None,
                    http_only: None,
                    secure: None,
                    same_site: None,
                },
                SessionCookie {
                    name: "web_session".into(),
                    value: "y".into(),
                    domain: ".example.com".into(),
                    path: "/".into(),
                    expires: None,
                    http_only: Some(true),
                    secure: Some(true),
                    same_site: Some("Lax".into()),
                },
            ],
            local_storage: None,
            session_storage: None,
        };
        assert_eq!(snapshot.cookie_header(), "a1=x; web_session=y");
    }

    #[test]
    fn snapshot_round_trips_camel_case() {
        let json = r#"{
            "cookies": [{"name":"n","value":"v","domain":"d","path":"/","httpOnly":true}],
            "localStorage": {"k":"v"}
        }"#;
        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.cookies.len(), 1);
        assert_eq!(snapshot.cookies[0].http_only, Some(true));
        assert_eq!(
            snapshot.local_storage.as_ref().unwrap().get("k").map(String::as_str),
            Some("v")
        );
        assert!(snapshot.session_storage.is_none());
    }
}
