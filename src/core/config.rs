//! Configuration for the synchronization engine
//!
//! Configuration is an explicit value built by the application and handed to
//! the components that need it (`WindshaftClient`, `WindshaftMap`,
//! `Dashboard`). There is no process-wide default instance.

use std::time::Duration;

use serde::Deserialize;

use crate::core::constants::{
    BOUNDING_BOX_FILTER_WAIT_MS, MAPS_API_BASE_URL, MAP_INSTANTIATION_LIMIT, MAX_GET_SIZE,
};
use crate::{MapError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Host template of the Maps API, e.g. `https://{user}.carto.com`
    pub url_template: String,
    pub user_name: String,
    pub stat_tag: Option<String>,
    pub api_key: Option<String>,
    pub auth_token: Option<String>,
    /// Path of the instantiation endpoint, relative to the host
    pub endpoint: String,
    /// POST even small payloads when cross-origin POST is available
    pub force_cors: bool,
    pub cors_supported: bool,
    pub max_get_size: usize,
    /// Dedup ceiling for identical instantiation requests
    pub instantiation_limit: usize,
    pub bbox_debounce_ms: u64,
    /// Tracked requests older than this are no longer considered duplicates
    pub request_window_ms: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            url_template: "https://{user}.carto.com".to_string(),
            user_name: String::new(),
            stat_tag: None,
            api_key: None,
            auth_token: None,
            endpoint: MAPS_API_BASE_URL.to_string(),
            force_cors: false,
            cors_supported: true,
            max_get_size: MAX_GET_SIZE,
            instantiation_limit: MAP_INSTANTIATION_LIMIT,
            bbox_debounce_ms: BOUNDING_BOX_FILTER_WAIT_MS,
            request_window_ms: None,
        }
    }
}

impl SyncConfig {
    pub fn new(url_template: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    /// Zero debounce so viewport changes settle immediately.
    pub fn for_testing() -> Self {
        Self {
            url_template: "http://{user}.example.com".to_string(),
            user_name: "tester".to_string(),
            bbox_debounce_ms: 0,
            ..Self::default()
        }
    }

    /// Load a configuration from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.url_template.is_empty() {
            return Err(MapError::MissingAttribute("url_template"));
        }
        if self.user_name.is_empty() {
            return Err(MapError::MissingAttribute("user_name"));
        }
        if self.instantiation_limit == 0 {
            return Err(MapError::Validation(
                "instantiation_limit must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    pub fn with_stat_tag(mut self, stat_tag: impl Into<String>) -> Self {
        self.stat_tag = Some(stat_tag.into());
        self
    }

    /// User host with the `{user}` placeholder substituted.
    pub fn host(&self) -> String {
        self.url_template.replace("{user}", &self.user_name)
    }

    pub fn use_https(&self) -> bool {
        self.url_template.starts_with("https")
    }

    pub fn protocol(&self) -> &'static str {
        if self.use_https() {
            "https"
        } else {
            "http"
        }
    }

    /// `api_key` wins over `auth_token`; never both.
    pub fn auth_param(&self) -> Option<(&'static str, &str)> {
        if let Some(api_key) = self.api_key.as_deref() {
            Some(("api_key", api_key))
        } else {
            self.auth_token
                .as_deref()
                .map(|auth_token| ("auth_token", auth_token))
        }
    }

    pub fn bbox_debounce(&self) -> Duration {
        Duration::from_millis(self.bbox_debounce_ms)
    }

    pub fn request_window(&self) -> Option<Duration> {
        self.request_window_ms.map(Duration::from_millis)
    }
}
