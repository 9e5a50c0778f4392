// Sweep scheduler: two independent periodic triggers over all followed
// accounts — a low-frequency profile sweep and a higher-frequency feed
// sweep. One account's failure never aborts a sweep. Sweeps iterate
// sequentially, which bounds the load on the upstream platform; refreshes
// colliding across sweeps are still deduplicated by the credential broker.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use followfeed_store::FollowStore;

use crate::orchestrator::SyncService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Profile,
    Feed,
}

impl SweepKind {
    fn name(self) -> &'static str {
        match self {
            SweepKind::Profile => "profile",
            SweepKind::Feed => "feed",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SweepStats {
    pub synced: usize,
    pub failed: usize,
}

/// Run one sweep of the given kind over every followed account.
pub async fn run_sweep(
    service: &SyncService,
    store: &dyn FollowStore,
    kind: SweepKind,
) -> SweepStats {
    let mut stats = SweepStats::default();

    let users = match store.list_followed_users().await {
        Ok(users) => users,
        Err(e) => {
            error!(sweep = kind.name(), error = %e, "Failed to list followed users");
            return stats;
        }
    };

    for user in users {
        let result = match kind {
            SweepKind::Profile => service.sync_user_profile(user.id).await,
            SweepKind::Feed => service.sync_user_feeds(user.id).await,
        };
        match result {
            Ok(()) => stats.synced += 1,
            Err(e) => {
                // Isolate this account's failure; the sweep continues.
                warn!(sweep = kind.name(), user_id = %user.id, error = %e, "Sweep item failed");
                stats.failed += 1;
            }
        }
    }

    info!(
        sweep = kind.name(),
        synced = stats.synced,
        failed = stats.failed,
        "Sweep complete"
    );
    stats
}

/// Owns the two periodic sweep tasks. Started and stopped by the
/// composition root.
pub struct SweepScheduler {
    service: Arc<SyncService>,
    store: Arc<dyn FollowStore>,
    profile_interval: Duration,
    feed_interval: Duration,
    handles: Vec<JoinHandle<()>>,
}

impl SweepScheduler {
    pub fn new(
        service: Arc<SyncService>,
        store: Arc<dyn FollowStore>,
        profile_interval: Duration,
        feed_interval: Duration,
    ) -> Self {
        Self {
            service,
            store,
            profile_interval,
            feed_interval,
            handles: Vec::new(),
        }
    }

    /// Spawn the two interval tasks. The first tick of each fires
    /// immediately, so a restart resumes syncing right away.
    pub fn start(&mut self) {
        if !self.handles.is_empty() {
            return;
        }
        info!(
            profile_interval_secs = self.profile_interval.as_secs(),
            feed_interval_secs = self.feed_interval.as_secs(),
            "Starting sweep scheduler"
        );
        self.handles.push(self.spawn_sweep(SweepKind::Profile, self.profile_interval));
        self.handles.push(self.spawn_sweep(SweepKind::Feed, self.feed_interval));
    }

    fn spawn_sweep(&self, kind: SweepKind, period: Duration) -> JoinHandle<()> {
        let service = self.service.clone();
        let store = self.store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                run_sweep(&service, store.as_ref(), kind).await;
            }
        })
    }

    /// Abort the sweep tasks. An in-flight sync operation is cancelled at
    /// its next await point.
    pub fn shutdown(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
