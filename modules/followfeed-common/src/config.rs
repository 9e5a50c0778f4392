use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Headless browser automation service
    pub headless_url: String,
    pub headless_token: Option<String>,

    // Durable state (session snapshots)
    pub data_dir: String,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Sweep intervals
    pub profile_sync_interval_secs: u64,
    pub feed_sync_interval_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            headless_url: required_env("HEADLESS_URL"),
            headless_token: env::var("HEADLESS_TOKEN").ok(),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            web_host: env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: env::var("WEB_PORT")
                .unwrap_or_else(|_| "4001".to_string())
                .parse()
                .expect("WEB_PORT must be a number"),
            profile_sync_interval_secs: env::var("PROFILE_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "21600".to_string())
                .parse()
                .expect("PROFILE_SYNC_INTERVAL_SECS must be a number"),
            feed_sync_interval_secs: env::var("FEED_SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .expect("FEED_SYNC_INTERVAL_SECS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
