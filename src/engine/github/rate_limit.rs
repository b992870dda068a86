// ── AgentDeck Engine: Rate Governor ────────────────────────────────────────
//
// A report layer over GitHub's own quota headers. Nothing here throttles or
// counts requests between calls; the concurrency ceiling lives in the update
// engine. Quota state is a value carried alongside each response and folded
// per batch.

use log::{debug, info};
use reqwest::header::HeaderMap;

use super::client::GitHubClient;
use super::wire::RateLimitResponse;
use crate::atoms::constants::{
    AUTHENTICATED_HOURLY_QUOTA, LOW_QUOTA_THRESHOLD, UNAUTHENTICATED_HOURLY_QUOTA,
};
use crate::atoms::error::{FetchError, FetchFailure};
use crate::atoms::types::{Fetched, RateLimitInfo};
use crate::engine::http::classify_response;

/// Read `x-ratelimit-{remaining,limit,reset}`. All three must be present.
pub fn parse_rate_limit(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header = |name: &str| headers.get(name)?.to_str().ok()?.trim().parse::<i64>().ok();
    let remaining = header("x-ratelimit-remaining")?;
    let limit = header("x-ratelimit-limit")?;
    let reset_at = header("x-ratelimit-reset")?;
    Some(RateLimitInfo {
        remaining: u32::try_from(remaining).ok()?,
        limit: u32::try_from(limit).ok()?,
        reset_at,
    })
}

// ── Per-batch quota fold ───────────────────────────────────────────────────

/// Lowest quota reading seen over a set of responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaSnapshot(Option<RateLimitInfo>);

impl QuotaSnapshot {
    pub fn observe(&mut self, info: Option<&RateLimitInfo>) {
        let Some(info) = info else { return };
        let lower = match self.0 {
            None => true,
            Some(cur) => {
                info.remaining < cur.remaining
                    || (info.remaining == cur.remaining && info.reset_at > cur.reset_at)
            }
        };
        if lower {
            self.0 = Some(*info);
        }
    }

    pub fn merge(mut self, other: QuotaSnapshot) -> QuotaSnapshot {
        self.observe(other.0.as_ref());
        self
    }

    pub fn get(&self) -> Option<RateLimitInfo> {
        self.0
    }

    /// Fold the quota readout of a remote call, successful or not, and
    /// unwrap its outcome.
    pub fn settle<T>(&mut self, result: Result<Fetched<T>, FetchFailure>) -> Result<T, FetchError> {
        match result {
            Ok(fetched) => {
                self.observe(fetched.rate_limit.as_ref());
                Ok(fetched.value)
            }
            Err(failure) => {
                self.observe(failure.rate_limit.as_ref());
                Err(failure.error)
            }
        }
    }
}

// ── User-facing warnings ───────────────────────────────────────────────────

/// A warning for the UI when the quota is exhausted or nearly so.
pub fn quota_warning(info: &RateLimitInfo) -> Option<String> {
    if info.remaining > LOW_QUOTA_THRESHOLD {
        return None;
    }
    let reset = chrono::DateTime::from_timestamp(info.reset_at, 0)
        .map(|t| t.format("%H:%M UTC").to_string())
        .unwrap_or_else(|| "soon".to_string());
    let mut msg = if info.remaining == 0 {
        format!("GitHub API quota exhausted ({} requests/hour); resets at {}.", info.limit, reset)
    } else {
        format!(
            "GitHub API quota low: {} of {} requests left; resets at {}.",
            info.remaining, info.limit, reset
        )
    };
    if info.limit <= UNAUTHENTICATED_HOURLY_QUOTA {
        msg.push_str(&format!(
            " Configure a GitHub token to raise the limit to {}/hour.",
            AUTHENTICATED_HOURLY_QUOTA
        ));
    }
    Some(msg)
}

// ── Token validation ───────────────────────────────────────────────────────

impl GitHubClient {
    /// Check a candidate token against `GET /rate_limit` and report the quota
    /// it grants. The token is never persisted here.
    pub async fn validate_token(&self, token: &str) -> Result<RateLimitInfo, FetchError> {
        if token.trim().is_empty() {
            return Err(FetchError::InvalidInput("token is empty".into()));
        }
        let url = format!("{}/rate_limit", self.api_base);
        let response = self.request(&url, Some(token)).send().await?;
        let headers = response.headers().clone();
        let from_headers =
            classify_response(response.status(), &headers).map_err(|failure| failure.error)?;
        if let Some(info) = from_headers {
            info!("[github] Token valid: {}/{} requests remaining", info.remaining, info.limit);
            return Ok(info);
        }
        debug!("[github] rate_limit response had no quota headers, reading body");
        let body = response.bytes().await?;
        let parsed: RateLimitResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Malformed(format!("rate_limit body: {}", e)))?;
        Ok(RateLimitInfo {
            remaining: parsed.rate.remaining,
            limit: parsed.rate.limit,
            reset_at: parsed.rate.reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn info(remaining: u32, limit: u32, reset_at: i64) -> RateLimitInfo {
        RateLimitInfo { remaining, limit, reset_at }
    }

    #[test]
    fn parses_complete_headers() {
        let mut h = HeaderMap::new();
        h.insert("x-ratelimit-remaining", HeaderValue::from_static("57"));
        h.insert("x-ratelimit-limit", HeaderValue::from_static("60"));
        h.insert("x-ratelimit-reset", HeaderValue::from_static("1700003600"));
        assert_eq!(parse_rate_limit(&h), Some(info(57, 60, 1_700_003_600)));
    }

    #[test]
    fn partial_headers_yield_none() {
        let mut h = HeaderMap::new();
        h.insert("x-ratelimit-remaining", HeaderValue::from_static("57"));
        assert_eq!(parse_rate_limit(&h), None);
        h.insert("x-ratelimit-limit", HeaderValue::from_static("sixty"));
        h.insert("x-ratelimit-reset", HeaderValue::from_static("1"));
        assert_eq!(parse_rate_limit(&h), None);
    }

    #[test]
    fn snapshot_keeps_lowest_remaining() {
        let mut q = QuotaSnapshot::default();
        q.observe(None);
        assert_eq!(q.get(), None);
        q.observe(Some(&info(50, 60, 10)));
        q.observe(Some(&info(40, 60, 10)));
        q.observe(Some(&info(45, 60, 10)));
        assert_eq!(q.get().unwrap().remaining, 40);

        let mut other = QuotaSnapshot::default();
        other.observe(Some(&info(3, 60, 20)));
        assert_eq!(q.merge(other).get(), Some(info(3, 60, 20)));
    }

    #[test]
    fn settle_folds_quota_from_failures() {
        let mut q = QuotaSnapshot::default();
        let ok: Result<Fetched<&str>, FetchFailure> = Ok(Fetched::new("sha", Some(info(30, 60, 1))));
        assert_eq!(q.settle(ok), Ok("sha"));

        let gone: Result<Fetched<&str>, FetchFailure> =
            Err(FetchFailure::new(FetchError::NotFound, Some(info(29, 60, 1))));
        assert_eq!(q.settle(gone), Err(FetchError::NotFound));
        assert_eq!(q.get().unwrap().remaining, 29);

        let bare: Result<Fetched<&str>, FetchFailure> = Err(FetchError::Unauthorized.into());
        assert_eq!(q.settle(bare), Err(FetchError::Unauthorized));
        assert_eq!(q.get().unwrap().remaining, 29);
    }

    #[test]
    fn warning_thresholds() {
        assert!(quota_warning(&info(4000, 5000, 0)).is_none());
        let low = quota_warning(&info(5, 60, 1_700_000_000)).unwrap();
        assert!(low.contains("5 of 60"));
        assert!(low.contains("token"));
        let out = quota_warning(&info(0, 5000, 1_700_000_000)).unwrap();
        assert!(out.contains("exhausted"));
        assert!(!out.contains("Configure"));
    }
}
