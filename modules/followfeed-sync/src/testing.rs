// Test mocks for the sync engine.
//
// Three mocks matching the three trait boundaries:
// - MockCrawler (Crawler) — HashMap-based cursor→page, builder configured
// - ScriptedBackend/ScriptedContext (AutomationBackend/AutomationContext)
// - ScriptedProbe (LoginProbe) — queued authenticated-state answers
//
// No network, no browser, no database.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use followfeed_common::{
    FetchedPage, FollowFeedError, Profile, Result, SessionCookie,
};

use crate::crawler::Crawler;
use crate::session::{AutomationBackend, AutomationContext, LoginProbe};

// ---------------------------------------------------------------------------
// MockCrawler
// ---------------------------------------------------------------------------

/// Builder-configured crawler: pages are keyed by the `since_cursor` they
/// answer, so a test can script an exact bootstrap-then-incremental
/// sequence. Unregistered cursors are an error.
#[derive(Default)]
pub struct MockCrawler {
    profile: Option<Profile>,
    profile_error: Option<String>,
    pages: HashMap<String, FetchedPage>,
    posts_error: Option<String>,
    pub profile_calls: AtomicUsize,
    pub posts_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
}

impl MockCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Make `fetch_user_profile` fail with a transport error carrying
    /// exactly this message.
    pub fn with_profile_error(mut self, message: &str) -> Self {
        self.profile_error = Some(message.to_string());
        self
    }

    pub fn with_page(mut self, since_cursor: &str, page: FetchedPage) -> Self {
        self.pages.insert(since_cursor.to_string(), page);
        self
    }

    pub fn with_posts_error(mut self, message: &str) -> Self {
        self.posts_error = Some(message.to_string());
        self
    }
}

#[async_trait]
impl Crawler for MockCrawler {
    async fn fetch_user_profile(&self, _profile_url: &str) -> Result<Profile> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.profile_error {
            return Err(FollowFeedError::Transport(message.clone()));
        }
        self.profile
            .clone()
            .ok_or_else(|| FollowFeedError::RemoteProtocol("no profile registered".to_string()))
    }

    async fn fetch_latest_posts(
        &self,
        _profile_url: &str,
        since_cursor: &str,
    ) -> Result<FetchedPage> {
        self.posts_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.posts_error {
            return Err(FollowFeedError::Transport(message.clone()));
        }
        self.pages.get(since_cursor).cloned().ok_or_else(|| {
            FollowFeedError::RemoteProtocol(format!(
                "no page registered for cursor {since_cursor:?}"
            ))
        })
    }

    async fn refresh_credential(&self) -> Result<()> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedBackend / ScriptedContext
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ContextState {
    closed: AtomicBool,
    navigations: Mutex<Vec<String>>,
    added_cookies: Mutex<Vec<SessionCookie>>,
    cookies_to_return: Mutex<Vec<SessionCookie>>,
    fail_add_cookies: AtomicBool,
}

/// Automation backend whose contexts share observable state with the test.
#[derive(Default)]
pub struct ScriptedBackend {
    state: Arc<ContextState>,
    pub opened: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cookies the context will report after login.
    pub fn set_cookies(&self, cookies: Vec<SessionCookie>) {
        *self.state.cookies_to_return.lock().unwrap() = cookies;
    }

    /// Make `add_cookies` fail, exercising the hydration fallback.
    pub fn fail_add_cookies(&self) {
        self.state.fail_add_cookies.store(true, Ordering::SeqCst);
    }

    pub fn context_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.navigations.lock().unwrap().clone()
    }

    pub fn added_cookies(&self) -> Vec<SessionCookie> {
        self.state.added_cookies.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationBackend for ScriptedBackend {
    async fn open(&self) -> Result<Box<dyn AutomationContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            state: self.state.clone(),
        }))
    }
}

pub struct ScriptedContext {
    state: Arc<ContextState>,
}

#[async_trait]
impl AutomationContext for ScriptedContext {
    async fn add_cookies(&mut self, cookies: &[SessionCookie]) -> Result<()> {
        if self.state.fail_add_cookies.load(Ordering::SeqCst) {
            return Err(FollowFeedError::Automation(
                "scripted add_cookies failure".to_string(),
            ));
        }
        self.state
            .added_cookies
            .lock()
            .unwrap()
            .extend(cookies.iter().cloned());
        Ok(())
    }

    async fn seed_storage(
        &mut self,
        _local: &HashMap<String, String>,
        _session: &HashMap<String, String>,
    ) -> Result<()> {
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn evaluate(&mut self, _expression: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Null)
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>> {
        Ok(self.state.cookies_to_return.lock().unwrap().clone())
    }

    async fn storage(&mut self) -> Result<(HashMap<String, String>, HashMap<String, String>)> {
        Ok((HashMap::new(), HashMap::new()))
    }

    async fn close(&mut self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedProbe
// ---------------------------------------------------------------------------

/// Login probe answering `is_authenticated` from a scripted queue; once the
/// queue is exhausted it keeps answering `false`.
pub struct ScriptedProbe {
    entry_url: String,
    answers: Mutex<VecDeque<bool>>,
    presented: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(entry_url: &str, answers: Vec<bool>) -> Self {
        Self {
            entry_url: entry_url.to_string(),
            answers: Mutex::new(answers.into()),
            presented: AtomicUsize::new(0),
        }
    }

    /// How many times the login affordance was presented.
    pub fn presented(&self) -> usize {
        self.presented.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LoginProbe for ScriptedProbe {
    fn entry_url(&self) -> &str {
        &self.entry_url
    }

    async fn is_authenticated(&self, _ctx: &mut dyn AutomationContext) -> Result<bool> {
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(false))
    }

    async fn present_login(&self, _ctx: &mut dyn AutomationContext) -> Result<()> {
        self.presented.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
