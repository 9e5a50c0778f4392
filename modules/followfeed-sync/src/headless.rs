// Concrete automation backend over the remote headless-browser service.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use followfeed_common::{FollowFeedError, Result, SessionCookie};
use headless_client::{Cookie, HeadlessClient};

use crate::session::{AutomationBackend, AutomationContext};

pub struct HeadlessBackend {
    client: Arc<HeadlessClient>,
}

impl HeadlessBackend {
    pub fn new(client: HeadlessClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl AutomationBackend for HeadlessBackend {
    async fn open(&self) -> Result<Box<dyn AutomationContext>> {
        let session = self
            .client
            .create_session()
            .await
            .map_err(|e| FollowFeedError::Automation(e.to_string()))?;
        Ok(Box::new(HeadlessContext {
            client: self.client.clone(),
            session,
            closed: false,
        }))
    }
}

pub struct HeadlessContext {
    client: Arc<HeadlessClient>,
    session: String,
    closed: bool,
}

fn automation_err(e: headless_client::HeadlessError) -> FollowFeedError {
    FollowFeedError::Automation(e.to_string())
}

fn to_client_cookie(c: &SessionCookie) -> Cookie {
    Cookie {
        name: c.name.clone(),
        value: c.value.clone(),
        domain: c.domain.clone(),
        path: c.path.clone(),
        expires: c.expires,
        http_only: c.http_only,
        secure: c.secure,
        same_site: c.same_site.clone(),
    }
}

fn from_client_cookie(c: Cookie) -> SessionCookie {
    SessionCookie {
        name: c.name,
        value: c.value,
        domain: c.domain,
        path: c.path,
        expires: c.expires,
        http_only: c.http_only,
        secure: c.secure,
        same_site: c.same_site,
    }
}

/// JS that copies a JSON object into a Storage instance.
fn seed_script(target: &str, entries: &HashMap<String, String>) -> Result<String> {
    let json = serde_json::to_string(entries)
        .map_err(|e| FollowFeedError::Automation(e.to_string()))?;
    Ok(format!(
        "(() => {{ const data = {json}; for (const [k, v] of Object.entries(data)) {target}.setItem(k, v); }})()"
    ))
}

const READ_STORAGE_SCRIPT: &str = r#"(() => {
    const dump = (s) => {
        const out = {};
        for (let i = 0; i < s.length; i++) { const k = s.key(i); out[k] = s.getItem(k); }
        return out;
    };
    return { local: dump(window.localStorage), session: dump(window.sessionStorage) };
})()"#;

#[async_trait]
impl AutomationContext for HeadlessContext {
    async fn add_cookies(&mut self, cookies: &[SessionCookie]) -> Result<()> {
        let cookies: Vec<Cookie> = cookies.iter().map(to_client_cookie).collect();
        self.client
            .set_cookies(&self.session, &cookies)
            .await
            .map_err(automation_err)
    }

    async fn seed_storage(
        &mut self,
        local: &HashMap<String, String>,
        session: &HashMap<String, String>,
    ) -> Result<()> {
        if !local.is_empty() {
            self.client
                .evaluate(&self.session, &seed_script("localStorage", local)?)
                .await
                .map_err(automation_err)?;
        }
        if !session.is_empty() {
            self.client
                .evaluate(&self.session, &seed_script("sessionStorage", session)?)
                .await
                .map_err(automation_err)?;
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client
            .navigate(&self.session, url)
            .await
            .map_err(automation_err)
    }

    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        self.client
            .evaluate(&self.session, expression)
            .await
            .map_err(automation_err)
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>> {
        let cookies = self
            .client
            .get_cookies(&self.session)
            .await
            .map_err(automation_err)?;
        Ok(cookies.into_iter().map(from_client_cookie).collect())
    }

    async fn storage(&mut self) -> Result<(HashMap<String, String>, HashMap<String, String>)> {
        let value = self
            .client
            .evaluate(&self.session, READ_STORAGE_SCRIPT)
            .await
            .map_err(automation_err)?;

        let parse = |key: &str| -> HashMap<String, String> {
            value
                .get(key)
                .and_then(|v| serde_json::from_value(v.clone()).ok())
                .unwrap_or_default()
        };
        Ok((parse("local"), parse("session")))
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client
            .close_session(&self.session)
            .await
            .map_err(automation_err)
    }
}

impl Drop for HeadlessContext {
    fn drop(&mut self) {
        if !self.closed {
            // Close is normally awaited by the acquirer; this is the last
            // resort for a context dropped mid-flight.
            warn!(session = self.session.as_str(), "Automation context dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_script_embeds_entries() {
        let mut entries = HashMap::new();
        entries.insert("k".to_string(), "v".to_string());
        let script = seed_script("localStorage", &entries).unwrap();
        assert!(script.contains(r#"{"k":"v"}"#));
        assert!(script.contains("localStorage.setItem"));
    }

    #[test]
    fn cookie_conversion_round_trips() {
        let cookie = SessionCookie {
            name: "n".into(),
            value: "v".into(),
            domain: ".x.com".into(),
            path: "/".into(),
            expires: Some(1.7e9),
            http_only: Some(true),
            secure: Some(false),
            same_site: Some("Lax".into()),
        };
        let back = from_client_cookie(to_client_cookie(&cookie));
        assert_eq!(back.name, cookie.name);
        assert_eq!(back.expires, cookie.expires);
        assert_eq!(back.same_site, cookie.same_site);
    }
}
