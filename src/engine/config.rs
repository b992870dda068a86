// engine/config.rs — Updater settings, persisted as JSON in engine_config.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::atoms::constants::{
    DEFAULT_API_BASE, DEFAULT_RAW_BASE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT,
    UPDATER_CONFIG_KEY,
};
use crate::atoms::error::{EngineError, EngineResult};
use crate::engine::store::EngineStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdaterConfig {
    /// GitHub REST base URL (GitHub Enterprise installs override this).
    pub api_base: String,
    /// Host serving raw file bytes as `{rawBase}/{owner}/{repo}/{branch}/{path}`.
    pub raw_base: String,
    /// Per-request timeout. Expiry surfaces as a transient failure.
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        UpdaterConfig {
            api_base: DEFAULT_API_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl UpdaterConfig {
    /// Load from the store; absent or unreadable config falls back to defaults.
    pub fn load(store: &EngineStore) -> UpdaterConfig {
        match store.get_config(UPDATER_CONFIG_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                warn!("[config] Ignoring unreadable updater config: {}", e);
                UpdaterConfig::default()
            }),
            Ok(None) => UpdaterConfig::default(),
            Err(e) => {
                warn!("[config] Failed to read updater config: {}", e);
                UpdaterConfig::default()
            }
        }
    }

    pub fn save(&self, store: &EngineStore) -> EngineResult<()> {
        self.validate()?;
        store.set_config(UPDATER_CONFIG_KEY, &serde_json::to_string(self)?)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.api_base.starts_with("https://") || self.api_base.starts_with("http://")) {
            return Err(EngineError::Config(format!("apiBase must be an http(s) URL: {}", self.api_base)));
        }
        if !(self.raw_base.starts_with("https://") || self.raw_base.starts_with("http://")) {
            return Err(EngineError::Config(format!("rawBase must be an http(s) URL: {}", self.raw_base)));
        }
        if self.request_timeout_secs == 0 || self.request_timeout_secs > 120 {
            return Err(EngineError::Config("requestTimeoutSecs must be between 1 and 120".into()));
        }
        Ok(())
    }
}
