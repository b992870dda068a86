// Branch resolver: runs a remote lookup against the recorded branch and, when
// that branch no longer exists, retries once against the repository's
// default branch. Never mutates stored state; the caller persists
// `corrected_branch`.

use log::info;
use std::future::Future;

use crate::atoms::error::{FetchError, FetchFailure};
use crate::atoms::types::{Fetched, RemoteLocation, ResourceKind, ResourcePayload};
use crate::engine::github::{QuotaSnapshot, RemoteRepo};

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub value: T,
    /// The default branch that answered after the recorded one was gone.
    pub corrected_branch: Option<String>,
}

/// Run `lookup` on `loc`, falling back to the default branch only when the
/// recorded branch itself is missing. A file missing from a live branch is
/// `NotFound` straight away. Every call is sequential, and every response
/// (failed ones included) is folded into `quota`.
pub async fn resolve<T, F, Fut>(
    remote: &dyn RemoteRepo,
    loc: &RemoteLocation,
    token: Option<&str>,
    quota: &mut QuotaSnapshot,
    lookup: F,
) -> Result<Resolution<T>, FetchError>
where
    F: Fn(RemoteLocation) -> Fut,
    Fut: Future<Output = Result<Fetched<T>, FetchFailure>>,
{
    match quota.settle(lookup(loc.clone()).await) {
        Ok(value) => return Ok(Resolution { value, corrected_branch: None }),
        Err(FetchError::NotFound) => {}
        Err(e) => return Err(e),
    }

    // Does the recorded branch still exist?
    match quota.settle(remote.get_latest_commit(&loc.owner, &loc.repo, &loc.branch, token).await) {
        Ok(_) => return Err(FetchError::NotFound),
        Err(FetchError::NotFound) => {}
        Err(e) => return Err(e),
    }

    let default_branch =
        quota.settle(remote.get_default_branch(&loc.owner, &loc.repo, token).await)?;
    if default_branch == loc.branch {
        return Err(FetchError::NotFound);
    }

    let value = quota.settle(lookup(loc.on_branch(&default_branch)).await)?;
    info!(
        "[updates] {}/{}: branch '{}' is gone, using '{}'",
        loc.owner, loc.repo, loc.branch, default_branch
    );
    Ok(Resolution { value, corrected_branch: Some(default_branch) })
}

/// Current fingerprint of a resource: blob id for single files, composite
/// tree fingerprint for bundles.
pub async fn resolve_fingerprint(
    remote: &dyn RemoteRepo,
    kind: ResourceKind,
    loc: &RemoteLocation,
    token: Option<&str>,
    quota: &mut QuotaSnapshot,
) -> Result<Resolution<String>, FetchError> {
    resolve(remote, loc, token, quota, |at| async move {
        if kind.is_bundle() {
            remote.get_tree_fingerprint(&at, token).await
        } else {
            remote.get_blob_fingerprint(&at, token).await
        }
    })
    .await
}

/// Full content of a resource, fingerprinted by the same fetch.
pub async fn resolve_content(
    remote: &dyn RemoteRepo,
    kind: ResourceKind,
    loc: &RemoteLocation,
    token: Option<&str>,
    quota: &mut QuotaSnapshot,
) -> Result<Resolution<ResourcePayload>, FetchError> {
    resolve(remote, loc, token, quota, |at| async move {
        if kind.is_bundle() {
            remote.fetch_bundle(&at, token).await
        } else {
            remote.fetch_file(&at, token).await
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::updates::testing::{loc, FakeRemote};

    #[tokio::test]
    async fn primary_hit_needs_no_fallback() {
        let remote = FakeRemote::new().with_blob("main", "skills/r1.md", "abc123");
        let mut quota = QuotaSnapshot::default();
        let res = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap();
        assert_eq!(res, Resolution { value: "abc123".into(), corrected_branch: None });
        assert_eq!(remote.calls(), vec!["blob main skills/r1.md"]);
    }

    #[tokio::test]
    async fn stale_branch_falls_back_to_default() {
        let remote = FakeRemote::new()
            .with_branch("master")
            .with_default_branch("master")
            .with_blob("master", "skills/r1.md", "abc123");
        let mut quota = QuotaSnapshot::default();
        let res = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap();
        assert_eq!(res.value, "abc123");
        assert_eq!(res.corrected_branch.as_deref(), Some("master"));
        assert_eq!(
            remote.calls(),
            vec!["blob main skills/r1.md", "commit main", "default", "blob master skills/r1.md"]
        );
    }

    #[tokio::test]
    async fn file_gone_from_live_branch_skips_fallback() {
        let remote = FakeRemote::new()
            .with_branch("main")
            .with_default_branch("master")
            .with_blob("master", "skills/r1.md", "abc123");
        let mut quota = QuotaSnapshot::default();
        let err = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound);
        assert_eq!(remote.calls(), vec!["blob main skills/r1.md", "commit main"]);
    }

    #[tokio::test]
    async fn fallback_miss_is_not_found() {
        let remote = FakeRemote::new().with_branch("master").with_default_branch("master");
        let mut quota = QuotaSnapshot::default();
        let err = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound);
    }

    #[tokio::test]
    async fn default_equal_to_recorded_stops() {
        let remote = FakeRemote::new().with_default_branch("main");
        let mut quota = QuotaSnapshot::default();
        let err = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound);
        assert_eq!(remote.calls(), vec!["blob main skills/r1.md", "commit main", "default"]);
    }

    #[tokio::test]
    async fn branch_check_failure_is_not_reported_as_deleted() {
        let remote = FakeRemote::new().with_commit_error(FetchError::Transient("reset".into()));
        let mut quota = QuotaSnapshot::default();
        let err = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::atoms::error::FetchErrorKind::Transient);
    }

    #[tokio::test]
    async fn quota_folds_lowest_reading() {
        let remote = FakeRemote::new()
            .with_branch("master")
            .with_default_branch("master")
            .with_blob("master", "skills/r1.md", "abc123")
            .with_quota_countdown(50);
        let mut quota = QuotaSnapshot::default();
        resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap();
        // four calls, the last one reports 46 remaining
        assert_eq!(quota.get().map(|q| q.remaining), Some(46));
    }

    #[tokio::test]
    async fn quota_folds_from_failed_lookups() {
        // Blob, branch head and default branch all answer 404 with headers.
        let remote = FakeRemote::new().with_quota_countdown(50);
        let mut quota = QuotaSnapshot::default();
        let err = resolve_fingerprint(&remote, ResourceKind::Command, &loc("main"), None, &mut quota)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NotFound);
        assert_eq!(remote.calls(), vec!["blob main skills/r1.md", "commit main", "default"]);
        assert_eq!(quota.get().map(|q| q.remaining), Some(47));
    }
}
