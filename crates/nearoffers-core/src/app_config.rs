use std::path::PathBuf;
use std::time::Duration;

use crate::radius::SearchRadius;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub log_level: String,
    /// Directory holding the persisted key-value file.
    pub data_dir: PathBuf,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub search_radius: SearchRadius,
    pub auto_update_interval_secs: u64,
    pub location_max_age_secs: u64,
}

impl AppConfig {
    #[must_use]
    pub fn auto_update_interval(&self) -> Duration {
        Duration::from_secs(self.auto_update_interval_secs)
    }

    #[must_use]
    pub fn location_max_age(&self) -> Duration {
        Duration::from_secs(self.location_max_age_secs)
    }
}
