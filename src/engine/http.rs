// ── AgentDeck Engine: HTTP Client Factory & Response Classification ────────
//
// Shared by every call to the GitHub REST API.
//
//   • One reqwest::Client per engine, with a finite per-request timeout
//   • Status → FetchFailure mapping (404, 401, 403/429 + quota, 5xx)
//   • Retry-After parsing for secondary rate limits
//
// Nothing here retries. A failed lookup is reported to the caller and the
// user re-runs the batch.

use log::debug;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;

use crate::atoms::error::{EngineResult, FetchError, FetchFailure};
use crate::atoms::types::RateLimitInfo;
use crate::engine::config::UpdaterConfig;
use crate::engine::github::rate_limit::parse_rate_limit;

// ── Client factory ─────────────────────────────────────────────────────────

/// Build the HTTP client used for all GitHub calls.
pub fn build_client(config: &UpdaterConfig) -> EngineResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
        .connect_timeout(Duration::from_secs(config.request_timeout_secs.clamp(1, 10)))
        .build()?;
    Ok(client)
}

// ── Transient status detection ─────────────────────────────────────────────

/// Server-side failures worth a user-triggered re-run.
pub fn is_transient_status(status: u16) -> bool {
    matches!(status, 500 | 502 | 503 | 504 | 529)
}

/// Parse Retry-After header value (integer seconds only).
pub fn parse_retry_after(header_value: &str) -> Option<u64> {
    header_value.trim().parse::<u64>().ok()
}

// ── Response classification ────────────────────────────────────────────────

/// Map a response's status and headers to either the quota readout to attach
/// to the successful value, or a typed failure. Failures keep the quota
/// readout too.
pub fn classify_response(
    status: StatusCode,
    headers: &HeaderMap,
) -> Result<Option<RateLimitInfo>, FetchFailure> {
    let rate_limit = parse_rate_limit(headers);

    if status.is_success() {
        return Ok(rate_limit);
    }

    debug!("[github] HTTP {} (quota: {:?})", status.as_u16(), rate_limit);

    let error = match status.as_u16() {
        404 => FetchError::NotFound,
        401 => FetchError::Unauthorized,
        429 => FetchError::RateLimited(rate_limit),
        403 => {
            let exhausted = rate_limit.is_some_and(|info| info.remaining == 0);
            let secondary = headers
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .is_some();
            if exhausted || secondary {
                FetchError::RateLimited(rate_limit)
            } else {
                FetchError::Unauthorized
            }
        }
        code if is_transient_status(code) || status.is_server_error() => {
            FetchError::Transient(format!("HTTP {}", code))
        }
        code => FetchError::Malformed(format!("unexpected HTTP {}", code)),
    };
    Err(FetchFailure::new(error, rate_limit))
}
