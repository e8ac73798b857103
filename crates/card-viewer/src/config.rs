use std::time::Duration;

use card_common::http::HttpCardClientConfig;
use card_store::{StoreOptions, DEFAULT_SEARCH_DEBOUNCE};

/// Viewer configuration loaded explicitly from environment variables.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub client: HttpCardClientConfig,
    pub store: StoreOptions,
    /// Idle time before a search keystroke triggers a fetch.
    pub search_debounce: Duration,
}

impl ViewerConfig {
    /// Optional (see `HttpCardClientConfig::from_env` for the client variables):
    /// - `CARDS_SEARCH_DEBOUNCE_MS`: search debounce in milliseconds (default 300)
    /// - `CARDS_DISCARD_STALE_FETCHES`: ignore superseded list results (default false)
    pub fn from_env() -> Self {
        let search_debounce = std::env::var("CARDS_SEARCH_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_SEARCH_DEBOUNCE);

        Self {
            client: HttpCardClientConfig::from_env(),
            store: StoreOptions::from_env(),
            search_debounce,
        }
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url {
            self.client = self.client.with_base_url(url);
        }
        self
    }
}
