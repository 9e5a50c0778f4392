// Xiaohongshu adapter: profile and feed fetching against the edith API,
// plus the platform's login probe for the interactive session capability.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use url::Url;

use followfeed_common::{FetchedPage, FollowFeedError, Post, Profile, Result};

use crate::broker::CredentialBroker;
use crate::crawler::Crawler;
use crate::session::{AutomationContext, LoginProbe};
use crate::signer::RequestSigner;

const BACKEND_URL: &str = "https://edith.xiaohongshu.com";
const WEB_URL: &str = "https://www.xiaohongshu.com";
const LOGIN_BUTTON_SELECTOR: &str = "#login-btn.reds-button-new.login-btn";
const QR_SELECTOR: &str = ".qrcode-img";
const PAGE_SIZE: u32 = 30;

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ProfileData {
    basic_info: BasicInfo,
}

#[derive(Debug, Default, Deserialize)]
struct BasicInfo {
    nickname: Option<String>,
    red_id: Option<String>,
    images: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotesData {
    #[serde(default)]
    notes: Vec<Note>,
    #[serde(default)]
    cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Note {
    pub note_id: String,
    #[serde(default)]
    pub display_title: String,
    #[serde(default)]
    pub xsec_token: String,
}

// --- Adapter ---

pub struct XiaohongshuCrawler {
    client: reqwest::Client,
    base_url: String,
    broker: CredentialBroker,
    signer: Arc<dyn RequestSigner>,
}

impl XiaohongshuCrawler {
    pub fn new(broker: CredentialBroker, signer: Arc<dyn RequestSigner>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: BACKEND_URL.to_string(),
            broker,
            signer,
        }
    }

    /// The broker lazily triggers an interactive acquisition on first use;
    /// afterwards requests just read the current complete credential.
    async fn credential(&self) -> Result<String> {
        let current = self.broker.current().await;
        if !current.is_empty() {
            return Ok(current);
        }
        self.broker.refresh().await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, api: &str) -> Result<T> {
        let credential = self.credential().await?;
        let signed = self.signer.sign(&credential, api, None)?;

        let mut request = self.client.get(format!("{}{}", self.base_url, api));
        for (name, value) in &signed.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let cookie_header = signed
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        if !cookie_header.is_empty() {
            request = request.header("Cookie", cookie_header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FollowFeedError::Transport(e.to_string()))?;

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| FollowFeedError::Transport(e.to_string()))?;

        if !envelope.success {
            return Err(FollowFeedError::RemoteProtocol(
                envelope.msg.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| FollowFeedError::RemoteProtocol("missing response data".to_string()))
    }
}

#[async_trait]
impl Crawler for XiaohongshuCrawler {
    async fn fetch_user_profile(&self, profile_url: &str) -> Result<Profile> {
        let api = extract_api_path(profile_url);
        info!(api = api.as_str(), "xiaohongshu: fetching profile");

        let data: ProfileData = self.get_json(&api).await?;
        Ok(Profile {
            name: data.basic_info.nickname,
            username: data.basic_info.red_id,
            avatar: data.basic_info.images,
        })
    }

    async fn fetch_latest_posts(
        &self,
        profile_url: &str,
        since_cursor: &str,
    ) -> Result<FetchedPage> {
        let user_id = extract_user_id(profile_url);
        info!(
            user_id = user_id.as_str(),
            since_cursor, "xiaohongshu: fetching latest posts"
        );

        let mut walk = FeedWalk::new(since_cursor, Utc::now());
        let mut page_cursor = String::new();

        loop {
            let api = format!(
                "/api/sns/web/v1/user_posted?num={PAGE_SIZE}&cursor={page_cursor}&user_id={user_id}&image_formats=jpg,webp,avif"
            );
            let data: NotesData = self.get_json(&api).await?;
            match walk.absorb(&data) {
                Some(next) => page_cursor = next,
                None => break,
            }
        }

        Ok(walk.finish())
    }

    async fn refresh_credential(&self) -> Result<()> {
        self.broker.refresh().await.map(drop)
    }
}

// --- Pure helpers ---

/// Accumulates the page walk for one `fetch_latest_posts` call, keeping the
/// whole cursor algorithm out of the HTTP path.
struct FeedWalk {
    since_cursor: String,
    now: DateTime<Utc>,
    posts: Vec<Post>,
    newest_seen: Option<String>,
}

impl FeedWalk {
    fn new(since_cursor: &str, now: DateTime<Utc>) -> Self {
        Self {
            since_cursor: since_cursor.to_string(),
            now,
            posts: Vec::new(),
            newest_seen: None,
        }
    }

    /// Absorb one page. Returns the upstream cursor of the next page to
    /// fetch, or `None` when the walk is done:
    /// - boundary seen: the rest of history is already ingested;
    /// - bootstrap (empty cursor): first page only, never page deeper;
    /// - empty page or exhausted upstream cursor: nothing left to walk.
    fn absorb(&mut self, page: &NotesData) -> Option<String> {
        if self.newest_seen.is_none() {
            self.newest_seen = page.notes.first().map(|n| n.note_id.clone());
        }

        let (posts, hit_boundary) = collect_new_posts(&page.notes, &self.since_cursor, self.now);
        self.posts.extend(posts);

        if hit_boundary
            || self.since_cursor.is_empty()
            || page.notes.is_empty()
            || page.cursor.is_empty()
        {
            return None;
        }
        Some(page.cursor.clone())
    }

    fn finish(self) -> FetchedPage {
        FetchedPage {
            posts: self.posts,
            // The newest id observed becomes the next boundary — on
            // bootstrap too, otherwise the first page would be re-fetched
            // forever. With nothing observed, the boundary stands.
            next_cursor: self
                .newest_seen
                .unwrap_or(self.since_cursor),
        }
    }
}

/// Map notes to posts, stopping at the exclusive `since_cursor` boundary.
/// Returns the mapped posts and whether the boundary was seen.
pub(crate) fn collect_new_posts(
    notes: &[Note],
    since_cursor: &str,
    now: DateTime<Utc>,
) -> (Vec<Post>, bool) {
    let mut posts = Vec::new();
    for note in notes {
        if !since_cursor.is_empty() && note.note_id == since_cursor {
            return (posts, true);
        }
        posts.push(Post {
            business_id: format!("xhs-{}", note.note_id),
            title: note.display_title.clone(),
            content: String::new(),
            original_url: format!(
                "{WEB_URL}/explore/{}?xsec_token={}",
                note.note_id, note.xsec_token
            ),
            // The notes payload carries no timestamp; ingestion time
            // stands in.
            posted_at: now,
        });
    }
    (posts, false)
}

/// Last path segment of a profile URL, unless it is the bare "profile" page.
fn extract_user_id(profile_url: &str) -> String {
    let Ok(url) = Url::parse(profile_url) else {
        return String::new();
    };
    let Some(last) = url
        .path_segments()
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .last()
    else {
        return String::new();
    };
    if last == "profile" {
        String::new()
    } else {
        last.to_string()
    }
}

/// Path plus query of a profile URL, used directly as the profile api path.
fn extract_api_path(profile_url: &str) -> String {
    match Url::parse(profile_url) {
        Ok(url) => match url.query() {
            Some(query) => format!("{}?{}", url.path(), query),
            None => url.path().to_string(),
        },
        Err(_) => profile_url.to_string(),
    }
}

// --- Login probe ---

/// Authenticated iff the login button is absent from the entry page.
pub struct XiaohongshuProbe;

#[async_trait]
impl LoginProbe for XiaohongshuProbe {
    fn entry_url(&self) -> &str {
        WEB_URL
    }

    async fn is_authenticated(&self, ctx: &mut dyn AutomationContext) -> Result<bool> {
        let value = ctx
            .evaluate(&format!(
                "document.querySelector('{LOGIN_BUTTON_SELECTOR}') === null"
            ))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn present_login(&self, ctx: &mut dyn AutomationContext) -> Result<()> {
        let mut qr_src = qr_source(ctx).await?;

        if qr_src.is_none() {
            // The QR pane may be behind the login button.
            ctx.evaluate(&format!(
                "document.querySelector('{LOGIN_BUTTON_SELECTOR}')?.click()"
            ))
            .await?;
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            qr_src = qr_source(ctx).await?;
        }

        match qr_src {
            Some(src) => info!(
                qr_src = src.as_str(),
                "Scan the QR code with the Xiaohongshu app to log in"
            ),
            None => info!("QR element not found; complete the login in the browser manually"),
        }
        Ok(())
    }
}

async fn qr_source(ctx: &mut dyn AutomationContext) -> Result<Option<String>> {
    let value = ctx
        .evaluate(&format!(
            "document.querySelector('{QR_SELECTOR}')?.getAttribute('src')"
        ))
        .await?;
    Ok(value.as_str().map(String::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str) -> Note {
        Note {
            note_id: id.to_string(),
            display_title: format!("title-{id}"),
            xsec_token: "tok".to_string(),
        }
    }

    #[test]
    fn bootstrap_takes_the_whole_page() {
        let notes = vec![note("c"), note("b"), note("a")];
        let (posts, hit) = collect_new_posts(&notes, "", Utc::now());
        assert_eq!(posts.len(), 3);
        assert!(!hit);
        assert_eq!(posts[0].business_id, "xhs-c");
        assert_eq!(
            posts[0].original_url,
            "https://www.xiaohongshu.com/explore/c?xsec_token=tok"
        );
    }

    #[test]
    fn boundary_is_exclusive_and_discards_the_remainder() {
        let notes = vec![note("e"), note("d"), note("c"), note("b")];
        let (posts, hit) = collect_new_posts(&notes, "c", Utc::now());
        assert!(hit);
        assert_eq!(
            posts.iter().map(|p| p.business_id.as_str()).collect::<Vec<_>>(),
            vec!["xhs-e", "xhs-d"]
        );
    }

    #[test]
    fn empty_page_yields_nothing() {
        let (posts, hit) = collect_new_posts(&[], "c", Utc::now());
        assert!(posts.is_empty());
        assert!(!hit);
    }

    #[test]
    fn boundary_as_newest_yields_nothing() {
        let notes = vec![note("e"), note("d")];
        let (posts, hit) = collect_new_posts(&notes, "e", Utc::now());
        assert!(hit);
        assert!(posts.is_empty());
    }

    fn page(ids: &[&str], cursor: &str) -> NotesData {
        NotesData {
            notes: ids.iter().map(|id| note(id)).collect(),
            cursor: cursor.to_string(),
        }
    }

    #[test]
    fn bootstrap_walk_stops_after_one_page_and_reports_newest_id() {
        let mut walk = FeedWalk::new("", Utc::now());
        assert_eq!(walk.absorb(&page(&["b", "a"], "upstream-next")), None);

        let fetched = walk.finish();
        assert_eq!(fetched.posts.len(), 2);
        assert_eq!(fetched.next_cursor, "b");
    }

    #[test]
    fn empty_walk_returns_input_cursor_unchanged() {
        let mut walk = FeedWalk::new("c", Utc::now());
        assert_eq!(walk.absorb(&page(&[], "ignored")), None);

        let fetched = walk.finish();
        assert!(fetched.posts.is_empty());
        assert_eq!(fetched.next_cursor, "c");
    }

    #[test]
    fn incremental_walk_pages_until_the_boundary() {
        let mut walk = FeedWalk::new("a", Utc::now());
        assert_eq!(walk.absorb(&page(&["d", "c"], "p2")), Some("p2".to_string()));
        assert_eq!(walk.absorb(&page(&["b", "a"], "p3")), None);

        let fetched = walk.finish();
        assert_eq!(
            fetched.posts.iter().map(|p| p.business_id.as_str()).collect::<Vec<_>>(),
            vec!["xhs-d", "xhs-c", "xhs-b"]
        );
        assert_eq!(fetched.next_cursor, "d");
    }

    #[test]
    fn exhausted_upstream_cursor_ends_the_walk() {
        let mut walk = FeedWalk::new("zzz", Utc::now());
        assert_eq!(walk.absorb(&page(&["b", "a"], "")), None);

        let fetched = walk.finish();
        assert_eq!(fetched.posts.len(), 2);
        assert_eq!(fetched.next_cursor, "b");
    }

    #[test]
    fn extract_user_id_from_profile_url() {
        assert_eq!(
            extract_user_id("https://www.xiaohongshu.com/user/profile/65b62088000d5f9?xsec_token=AB%3D"),
            "65b62088000d5f9"
        );
    }

    #[test]
    fn extract_user_id_bare_profile_page_is_empty() {
        assert_eq!(extract_user_id("https://www.xiaohongshu.com/user/profile"), "");
    }

    #[test]
    fn extract_api_path_keeps_the_query() {
        assert_eq!(
            extract_api_path("https://www.xiaohongshu.com/user/profile/abc?xsec_token=x"),
            "/user/profile/abc?xsec_token=x"
        );
        assert_eq!(
            extract_api_path("https://www.xiaohongshu.com/user/profile/abc"),
            "/user/profile/abc"
        );
    }
}
