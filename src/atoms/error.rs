// ── AgentDeck Atoms: Error Types ───────────────────────────────────────────
// Error enums for the engine, built with `thiserror`.
//
// Design rules:
//   • `EngineError` is coarse-grained by domain (I/O, DB, Keyring, Config…).
//   • `FetchError` is the remote taxonomy; per-item check failures are
//     folded into results, never propagated across a batch boundary.
//   • No variant carries secret material (tokens) in its message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::RateLimitInfo;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client construction failure (reqwest layer).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// OS keychain / credential store failure.
    #[error("Keyring error: {0}")]
    Keyring(String),

    /// Token vault encryption / decryption failure.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

/// All engine operations should return this type.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}

// ── Remote fetch errors ────────────────────────────────────────────────────

/// Typed outcome of a failed call to the remote repository API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// HTTP 404 — the file, directory or branch does not exist.
    #[error("not found on remote")]
    NotFound,

    /// HTTP 403/429 carrying a rate-limit signal.
    #[error("{}", rate_limited_message(.0.as_ref()))]
    RateLimited(Option<RateLimitInfo>),

    /// HTTP 401 (or 403 without a rate-limit signal) — bad or insufficient token.
    #[error("authentication failed, check the GitHub token")]
    Unauthorized,

    /// Network failure, timeout or 5xx. Never retried automatically.
    #[error("network error: {0}")]
    Transient(String),

    /// The response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Malformed(String),

    /// The request was rejected before any network activity.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

fn rate_limited_message(info: Option<&RateLimitInfo>) -> String {
    match info {
        Some(info) => {
            let wait = (info.reset_at - chrono::Utc::now().timestamp()).max(0);
            format!(
                "GitHub API rate limit exceeded ({}/{} remaining, resets in {}s)",
                info.remaining, info.limit, wait
            )
        }
        None => "GitHub API rate limit exceeded".to_string(),
    }
}

/// Serializable discriminant of [`FetchError`], exposed to the UI so it can
/// tell a quota problem from a credential problem from a flaky network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    NotFound,
    RateLimited,
    Unauthorized,
    Transient,
    Malformed,
    InvalidInput,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::NotFound => FetchErrorKind::NotFound,
            Self::RateLimited(_) => FetchErrorKind::RateLimited,
            Self::Unauthorized => FetchErrorKind::Unauthorized,
            Self::Transient(_) => FetchErrorKind::Transient,
            Self::Malformed(_) => FetchErrorKind::Malformed,
            Self::InvalidInput(_) => FetchErrorKind::InvalidInput,
        }
    }

    /// Rate-limit headers attached to the failure, if any.
    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        match self {
            Self::RateLimited(info) => info.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Transient(format!("request timed out: {}", e))
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Transient(e.to_string())
        }
    }
}

// ── Remote failures with quota ─────────────────────────────────────────────

/// A remote failure together with whatever rate-limit headers the failing
/// response carried. GitHub reports quota on 404s and 5xxs too, so the
/// reading survives even when the call does not.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct FetchFailure {
    pub error: FetchError,
    pub rate_limit: Option<RateLimitInfo>,
}

impl FetchFailure {
    pub fn new(error: FetchError, rate_limit: Option<RateLimitInfo>) -> Self {
        FetchFailure { error, rate_limit }
    }
}

impl From<FetchError> for FetchFailure {
    fn from(error: FetchError) -> Self {
        let rate_limit = error.rate_limit().cloned();
        FetchFailure { error, rate_limit }
    }
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        FetchError::from(e).into()
    }
}

// ── Update executor errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("resource not installed: {0}")]
    UnknownResource(String),

    #[error("resource {0} has no upstream repository")]
    LocalOnly(String),

    #[error("remote fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("local write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("record store failed: {0}")]
    Store(#[from] EngineError),
}

// ── App sync errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("{app} is not configured on this machine")]
    AppUnavailable { app: String },

    #[error("invalid hook definition {id}: {reason}")]
    InvalidHook { id: String, reason: String },

    #[error("failed to write {app} config: {source}")]
    Write {
        app: String,
        #[source]
        source: std::io::Error,
    },
}
