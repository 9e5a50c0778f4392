// Crawl & sync engine: per-platform crawler adapters, the credential
// broker's single-flight refresh, the interactive session capability, the
// sync orchestrator, and the sweep scheduler.

pub mod broker;
pub mod crawler;
pub mod headless;
pub mod orchestrator;
pub mod scheduler;
pub mod session;
pub mod signer;
pub mod xiaohongshu;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use broker::{CredentialBroker, CredentialSource};
pub use crawler::{Crawler, CrawlerRegistry};
pub use headless::HeadlessBackend;
pub use orchestrator::SyncService;
pub use scheduler::{run_sweep, SweepKind, SweepScheduler, SweepStats};
pub use session::{
    AutomationBackend, AutomationContext, LoginProbe, SessionAcquirer, SnapshotStore,
};
pub use signer::{PassthroughSigner, RequestSigner, SignedRequest};
pub use xiaohongshu::{XiaohongshuCrawler, XiaohongshuProbe};
