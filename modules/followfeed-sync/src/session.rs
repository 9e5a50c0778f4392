// Interactive session capability: turn a browser automation context into a
// usable credential string.
//
// The concrete browser engine sits behind `AutomationBackend` /
// `AutomationContext`; the platform's login semantics sit behind
// `LoginProbe`. `SessionAcquirer` drives the protocol: hydrate a durable
// snapshot if one exists, probe authenticated state, walk a human through a
// QR login when needed, then persist the session wholesale and serialize the
// cookies as the credential. The automation context is released on every
// exit path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{info, warn};

use followfeed_common::{FollowFeedError, Result, SessionCookie, SessionSnapshot};

use crate::broker::CredentialSource;

/// Default login poll cadence.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Default poll attempt ceiling (60 × 1s ⇒ 60s wait ceiling).
const DEFAULT_MAX_ATTEMPTS: u32 = 60;

/// Opens exclusive automation contexts. The broker guarantees only one
/// acquisition per adapter reaches the backend at a time; the backend does
/// not enforce that itself.
#[async_trait]
pub trait AutomationBackend: Send + Sync {
    async fn open(&self) -> Result<Box<dyn AutomationContext>>;
}

/// One live browser context. Owned for the duration of an acquisition and
/// closed by the acquirer on every exit path.
#[async_trait]
pub trait AutomationContext: Send {
    async fn add_cookies(&mut self, cookies: &[SessionCookie]) -> Result<()>;
    async fn seed_storage(
        &mut self,
        local: &HashMap<String, String>,
        session: &HashMap<String, String>,
    ) -> Result<()>;
    async fn navigate(&mut self, url: &str) -> Result<()>;
    /// Evaluate a JavaScript expression in the current page.
    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value>;
    async fn cookies(&mut self) -> Result<Vec<SessionCookie>>;
    /// Read (localStorage, sessionStorage) from the current page.
    async fn storage(&mut self) -> Result<(HashMap<String, String>, HashMap<String, String>)>;
    async fn close(&mut self) -> Result<()>;
}

/// Platform-specific login semantics: where to go, how to tell whether the
/// session is authenticated, and how to surface the login affordance.
#[async_trait]
pub trait LoginProbe: Send + Sync {
    fn entry_url(&self) -> &str;
    async fn is_authenticated(&self, ctx: &mut dyn AutomationContext) -> Result<bool>;
    /// Present the login affordance (QR code) to the human operator.
    async fn present_login(&self, ctx: &mut dyn AutomationContext) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Snapshot persistence
// ---------------------------------------------------------------------------

/// JSON-file persistence for the durable session snapshot. Single-writer:
/// concurrent multi-process deployments need an external lock.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: data_dir.into().join("browser-session.json"),
        }
    }

    /// Load the snapshot if one exists. A corrupt or unreadable file is
    /// treated as absent — acquisition falls back to a fresh context.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&data) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt session snapshot, starting fresh");
                None
            }
        }
    }

    /// Overwrite the snapshot wholesale.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FollowFeedError::CredentialAcquisition(e.to_string()))?;
        }
        let data = serde_json::to_string_pretty(snapshot)
            .map_err(|e| FollowFeedError::CredentialAcquisition(e.to_string()))?;
        std::fs::write(&self.path, data)
            .map_err(|e| FollowFeedError::CredentialAcquisition(e.to_string()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionAcquirer
// ---------------------------------------------------------------------------

pub struct SessionAcquirer {
    backend: Arc<dyn AutomationBackend>,
    probe: Arc<dyn LoginProbe>,
    snapshots: SnapshotStore,
    poll_interval: Duration,
    max_attempts: u32,
}

impl SessionAcquirer {
    pub fn new(
        backend: Arc<dyn AutomationBackend>,
        probe: Arc<dyn LoginProbe>,
        snapshots: SnapshotStore,
    ) -> Self {
        Self {
            backend,
            probe,
            snapshots,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the login poll cadence and ceiling.
    pub fn with_poll(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_attempts = max_attempts;
        self
    }

    /// Acquire a credential, running the login wait to its ceiling.
    pub async fn acquire(&self) -> Result<String> {
        self.acquire_with_cancel(None).await
    }

    /// Acquire a credential, aborting the login wait when `cancel` flips to
    /// true.
    pub async fn acquire_with_cancel(
        &self,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<String> {
        let mut ctx = self.backend.open().await?;
        let result = self.drive(ctx.as_mut(), cancel).await;

        // Release the automation context on every exit path; a close
        // failure is logged but never masks the acquisition outcome.
        if let Err(e) = ctx.close().await {
            warn!(error = %e, "Failed to close automation context");
        }

        result
    }

    async fn drive(
        &self,
        ctx: &mut dyn AutomationContext,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<String> {
        self.hydrate(ctx).await;

        ctx.navigate(self.probe.entry_url()).await?;

        if self.probe.is_authenticated(ctx).await? {
            info!("Already authenticated, reading session");
        } else {
            info!("Not authenticated, presenting login affordance");
            self.probe.present_login(ctx).await?;
            self.wait_for_login(ctx, cancel).await?;
        }

        let cookies = ctx.cookies().await?;
        if cookies.is_empty() {
            return Err(FollowFeedError::CredentialAcquisition(
                "authenticated session produced no cookies".to_string(),
            ));
        }

        let (local, session) = match ctx.storage().await {
            Ok(storage) => storage,
            Err(e) => {
                warn!(error = %e, "Failed to read storage, snapshotting cookies only");
                (HashMap::new(), HashMap::new())
            }
        };

        let snapshot = SessionSnapshot {
            cookies,
            local_storage: (!local.is_empty()).then_some(local),
            session_storage: (!session.is_empty()).then_some(session),
        };

        if let Err(e) = self.snapshots.save(&snapshot) {
            // Losing the snapshot costs a future interactive login, not
            // this acquisition.
            warn!(error = %e, "Failed to persist session snapshot");
        }

        Ok(snapshot.cookie_header())
    }

    /// Hydrate cookies and storage from the durable snapshot. Any failure
    /// here degrades to a fresh, unhydrated context.
    async fn hydrate(&self, ctx: &mut dyn AutomationContext) {
        let Some(snapshot) = self.snapshots.load() else {
            return;
        };

        if !snapshot.cookies.is_empty() {
            if let Err(e) = ctx.add_cookies(&snapshot.cookies).await {
                warn!(error = %e, "Cookie hydration failed, continuing unhydrated");
                return;
            }
        }

        if snapshot.local_storage.is_some() || snapshot.session_storage.is_some() {
            // Storage can only be seeded once a page on the target origin
            // is open.
            if let Err(e) = ctx.navigate(self.probe.entry_url()).await {
                warn!(error = %e, "Pre-hydration navigation failed");
                return;
            }
            let local = snapshot.local_storage.unwrap_or_default();
            let session = snapshot.session_storage.unwrap_or_default();
            if let Err(e) = ctx.seed_storage(&local, &session).await {
                warn!(error = %e, "Storage hydration failed, continuing with cookies only");
            }
        }
    }

    async fn wait_for_login(
        &self,
        ctx: &mut dyn AutomationContext,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<()> {
        let mut attempts = 0u32;
        while attempts < self.max_attempts {
            if let Some(rx) = cancel.as_mut() {
                if *rx.borrow_and_update() {
                    return Err(FollowFeedError::CredentialAcquisition(
                        "login wait cancelled".to_string(),
                    ));
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            attempts += 1;

            if self.probe.is_authenticated(ctx).await? {
                info!(attempts, "Login confirmed");
                return Ok(());
            }

            if attempts % 10 == 0 {
                info!(attempts, max_attempts = self.max_attempts, "Waiting for login");
            }
        }

        Err(FollowFeedError::LoginTimeout {
            waited_secs: self.poll_interval.as_secs() * u64::from(self.max_attempts),
        })
    }
}

#[async_trait]
impl CredentialSource for SessionAcquirer {
    async fn acquire(&self) -> Result<String> {
        SessionAcquirer::acquire(self).await
    }
}
