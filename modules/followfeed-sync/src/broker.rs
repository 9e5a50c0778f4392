// Credential broker: owns one adapter's credential and serializes refreshes.
//
// State machine per adapter: Idle → Refreshing → Ready, with
// Refreshing → Idle on failure. While a refresh is in flight, every caller
// attaches to it through a shared watch channel and observes the same
// outcome; a second interactive acquisition is never started. The
// acquisition itself runs on a spawned task so a caller that goes away
// mid-refresh cannot strand the other waiters.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{info, warn};

use followfeed_common::{FollowFeedError, Result};

/// Produces a fresh credential string. Implemented by the interactive
/// session capability; mocked in tests.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn acquire(&self) -> Result<String>;
}

/// Outcome published to everyone attached to an in-flight refresh.
/// `None` until the leader finishes. The error is shared via `Arc` because
/// `FollowFeedError` is not `Clone`; waiters rematerialize it
/// message-for-message.
type RefreshOutcome = Option<std::result::Result<String, Arc<FollowFeedError>>>;

enum BrokerState {
    Idle,
    Refreshing(watch::Receiver<RefreshOutcome>),
    Ready,
}

struct BrokerInner {
    source: Arc<dyn CredentialSource>,
    /// Readers always observe a complete value — the credential is swapped
    /// wholesale under the write lock, never partially mutated.
    credential: RwLock<String>,
    state: Mutex<BrokerState>,
}

#[derive(Clone)]
pub struct CredentialBroker {
    inner: Arc<BrokerInner>,
}

impl CredentialBroker {
    pub fn new(source: Arc<dyn CredentialSource>) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                source,
                credential: RwLock::new(String::new()),
                state: Mutex::new(BrokerState::Idle),
            }),
        }
    }

    /// The current credential. Empty until the first successful refresh.
    pub async fn current(&self) -> String {
        self.inner.credential.read().await.clone()
    }

    /// Refresh the credential, deduplicating concurrent calls.
    ///
    /// The first caller in becomes the leader and starts one acquisition;
    /// everyone arriving while it is in flight awaits the same result. On
    /// failure the broker returns to Idle so a later call may retry.
    pub async fn refresh(&self) -> Result<String> {
        let mut rx = {
            let mut state = self.inner.state.lock().await;
            match &*state {
                BrokerState::Refreshing(rx) => {
                    info!("Credential refresh already in flight, attaching");
                    rx.clone()
                }
                _ => {
                    let (tx, rx) = watch::channel(None);
                    *state = BrokerState::Refreshing(rx.clone());

                    let inner = self.inner.clone();
                    tokio::spawn(async move {
                        let outcome = inner.source.acquire().await;
                        let mut state = inner.state.lock().await;
                        match outcome {
                            Ok(credential) => {
                                *inner.credential.write().await = credential.clone();
                                *state = BrokerState::Ready;
                                info!("Credential refreshed");
                                let _ = tx.send(Some(Ok(credential)));
                            }
                            Err(e) => {
                                *state = BrokerState::Idle;
                                warn!(error = %e, "Credential refresh failed");
                                let _ = tx.send(Some(Err(Arc::new(e))));
                            }
                        }
                    });

                    rx
                }
            }
        };

        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return match outcome {
                    Ok(credential) => Ok(credential),
                    Err(shared) => Err(shared_error(&shared)),
                };
            }
            if rx.changed().await.is_err() {
                return Err(FollowFeedError::CredentialAcquisition(
                    "refresh task dropped before publishing an outcome".to_string(),
                ));
            }
        }
    }
}

/// Rematerialize a shared refresh error for one waiter, preserving the
/// original message (and the timeout variant exactly).
fn shared_error(e: &FollowFeedError) -> FollowFeedError {
    match e {
        FollowFeedError::LoginTimeout { waited_secs } => FollowFeedError::LoginTimeout {
            waited_secs: *waited_secs,
        },
        other => FollowFeedError::CredentialAcquisition(other.to_string()),
    }
}
