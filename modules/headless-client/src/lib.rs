pub mod error;
pub mod types;

pub use error::{HeadlessError, Result};
pub use types::Cookie;

use std::time::Duration;

use types::{CookieList, EvalResult, SessionCreated};

/// Client for a remote headless-browser automation service.
///
/// The service exposes session-scoped endpoints: create a session, drive it
/// (navigate, cookies, evaluate), then close it. One session maps to one
/// isolated browser context on the service side.
pub struct HeadlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HeadlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let mut url = format!("{}{}", self.base_url, path);
        if let Some(ref token) = self.token {
            url.push_str(&format!("?token={token}"));
        }
        url
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HeadlessError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    /// Decode a successful response body, keeping transport failures and
    /// malformed bodies distinguishable.
    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Open a new isolated browser context. Returns its session id.
    pub async fn create_session(&self) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint("/session"))
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let created: SessionCreated = Self::decode(Self::check(resp).await?).await?;
        Ok(created.id)
    }

    /// Navigate the session's page and wait for DOM content loaded.
    pub async fn navigate(&self, session: &str, url: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint(&format!("/session/{session}/navigate")))
            .json(&serde_json::json!({ "url": url, "waitUntil": "domcontentloaded" }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Install cookies into the session's context.
    pub async fn set_cookies(&self, session: &str, cookies: &[Cookie]) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint(&format!("/session/{session}/cookies")))
            .json(&serde_json::json!({ "cookies": cookies }))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }

    /// Read all cookies currently held by the session's context.
    pub async fn get_cookies(&self, session: &str) -> Result<Vec<Cookie>> {
        let resp = self
            .client
            .get(self.endpoint(&format!("/session/{session}/cookies")))
            .send()
            .await?;
        let list: CookieList = Self::decode(Self::check(resp).await?).await?;
        Ok(list.cookies)
    }

    /// Evaluate a JavaScript expression in the session's page and return its
    /// JSON-serialized value.
    pub async fn evaluate(&self, session: &str, expression: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .post(self.endpoint(&format!("/session/{session}/evaluate")))
            .json(&serde_json::json!({ "expression": expression }))
            .send()
            .await?;
        let result: EvalResult = Self::decode(Self::check(resp).await?).await?;
        Ok(result.value)
    }

    /// Tear down the session and its browser context.
    pub async fn close_session(&self, session: &str) -> Result<()> {
        let resp = self
            .client
            .delete(self.endpoint(&format!("/session/{session}")))
            .send()
            .await?;
        Self::check(resp).await?;
        Ok(())
    }
}
