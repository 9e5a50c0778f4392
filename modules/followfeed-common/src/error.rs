use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, FollowFeedError>;

#[derive(Error, Debug)]
pub enum FollowFeedError {
    /// Network-level failure (timeout, connection reset, DNS). Always
    /// propagated; the engine never retries internally.
    #[error("Network error: {0}")]
    Transport(String),

    /// The platform was reachable but answered with a failure envelope.
    /// Carries the platform's own message.
    #[error("Platform error: {0}")]
    RemoteProtocol(String),

    /// Interactive session acquisition failed.
    #[error("Credential acquisition failed: {0}")]
    CredentialAcquisition(String),

    /// The login poll loop hit its attempt ceiling.
    #[error("Login timed out after {waited_secs}s")]
    LoginTimeout { waited_secs: u64 },

    #[error("No crawler registered for platform: {0}")]
    UnknownPlatform(String),

    #[error("Followed user not found: {0}")]
    NotFound(Uuid),

    #[error("Store error: {0}")]
    Store(String),

    /// Automation backend failure (browser service unreachable, bad session).
    #[error("Automation error: {0}")]
    Automation(String),
}
