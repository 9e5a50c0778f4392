mod rest;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use followfeed_common::Config;
use followfeed_store::{FollowStore, PgFollowStore};
use followfeed_sync::{
    CrawlerRegistry, CredentialBroker, HeadlessBackend, PassthroughSigner, SessionAcquirer,
    SnapshotStore, SweepScheduler, SyncService, XiaohongshuCrawler, XiaohongshuProbe,
};
use headless_client::HeadlessClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting followfeed-api");

    let config = Config::from_env();

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgFollowStore::new(pool));
    store.migrate().await?;
    tracing::info!("Connected to database, migrations complete");

    let store: Arc<dyn FollowStore> = store;

    // Interactive session pipeline: headless browser backend, login probe,
    // durable snapshot store, single-flight credential broker.
    let headless = HeadlessClient::new(&config.headless_url, config.headless_token.as_deref());
    let backend = Arc::new(HeadlessBackend::new(headless));
    let snapshots = SnapshotStore::new(&config.data_dir);
    let acquirer = SessionAcquirer::new(backend, Arc::new(XiaohongshuProbe), snapshots);
    let broker = CredentialBroker::new(Arc::new(acquirer));

    let mut registry = CrawlerRegistry::new();
    registry.register(
        "xiaohongshu",
        Arc::new(XiaohongshuCrawler::new(broker, Arc::new(PassthroughSigner))),
    );

    let service = SyncService::new(store.clone(), Arc::new(registry));

    let mut scheduler = SweepScheduler::new(
        Arc::new(service.clone()),
        store.clone(),
        Duration::from_secs(config.profile_sync_interval_secs),
        Duration::from_secs(config.feed_sync_interval_secs),
    );
    scheduler.start();

    let state = Arc::new(rest::AppState { service, store });
    let app = rest::build_router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    tracing::info!(%addr, "Listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
