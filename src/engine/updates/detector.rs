// Change detector: one resource in, one verdict out. Read-only against the
// record store apart from persisting a branch correction.

use log::{debug, warn};

use super::resolver::resolve_fingerprint;
use super::UpdateEngine;
use crate::atoms::error::{FetchError, UpdateError};
use crate::atoms::types::{CheckOutcome, InstalledResource, ResourceKind, UpdateCheckResult};
use crate::engine::github::{QuotaSnapshot, RemoteRepo};

/// Compare the remote fingerprint of `resource` with its recorded one.
/// Returns the verdict and the corrected branch, if the resolver found one.
pub async fn detect(
    remote: &dyn RemoteRepo,
    resource: &InstalledResource,
    token: Option<&str>,
    quota: &mut QuotaSnapshot,
) -> (CheckOutcome, Option<String>) {
    let Some(loc) = resource.location() else {
        let err = FetchError::InvalidInput(format!("{} has no upstream repository", resource.id));
        return (CheckOutcome::Failed(err), None);
    };

    let resolution = match resolve_fingerprint(remote, resource.kind, &loc, token, quota).await {
        Ok(resolution) => resolution,
        Err(FetchError::NotFound) => return (CheckOutcome::RemoteDeleted, None),
        Err(e) => return (CheckOutcome::Failed(e), None),
    };
    let corrected = resolution.corrected_branch;
    let fingerprint = resolution.value;

    let outcome = match resource.file_hash.as_deref() {
        None => CheckOutcome::NeedsBaseline { fingerprint },
        Some(recorded) if recorded == fingerprint => CheckOutcome::Unchanged,
        Some(_) => {
            let branch = corrected.as_deref().unwrap_or(&loc.branch);
            let head = remote.get_latest_commit(&loc.owner, &loc.repo, branch, token).await;
            let commit = match quota.settle(head) {
                Ok(commit) => Some(commit),
                Err(e) => {
                    debug!("[updates] No commit info for {}: {}", resource.id, e);
                    None
                }
            };
            CheckOutcome::Updated { new_hash: fingerprint, commit }
        }
    };
    (outcome, corrected)
}

impl UpdateEngine {
    /// Check one resource and persist any branch correction.
    pub(crate) async fn check_resource(
        &self,
        resource: &InstalledResource,
        token: Option<&str>,
    ) -> (UpdateCheckResult, QuotaSnapshot) {
        let mut quota = QuotaSnapshot::default();
        let (outcome, corrected) = detect(self.remote.as_ref(), resource, token, &mut quota).await;
        if let Some(branch) = corrected.as_deref() {
            if let Err(e) = self.store.set_branch(resource.kind, &resource.id, branch) {
                warn!("[updates] Could not persist branch '{}' for {}: {}", branch, resource.id, e);
            }
        }
        (UpdateCheckResult::from_outcome(&resource.id, outcome, corrected), quota)
    }

    /// Check a single installed resource.
    pub async fn check_one(
        &self,
        kind: ResourceKind,
        id: &str,
        token: Option<&str>,
    ) -> Result<UpdateCheckResult, UpdateError> {
        let resource = self
            .store
            .get(kind, id)?
            .ok_or_else(|| UpdateError::UnknownResource(id.to_string()))?;
        if !resource.is_remote() {
            return Err(UpdateError::LocalOnly(id.to_string()));
        }
        let _permit = self.semaphore.acquire().await.ok();
        Ok(self.check_resource(&resource, token).await.0)
    }
}
