// Baseline capture for records installed before fingerprints were tracked.
// Records the current remote fingerprint without touching SSOT content.

use log::{info, warn};

use super::resolver::resolve_fingerprint;
use super::scheduler::run_bounded;
use super::UpdateEngine;
use crate::atoms::error::{EngineResult, UpdateError};
use crate::atoms::types::{
    BatchUpdateResult, InstalledResource, ResourceKind, UpdateEvent, UpdateExecuteResult, UpdateOutcome,
};
use crate::engine::github::QuotaSnapshot;

impl UpdateEngine {
    /// Fingerprint every remote record of `kind` that has none yet.
    pub async fn capture_baselines(
        &self,
        kind: ResourceKind,
        token: Option<&str>,
    ) -> EngineResult<BatchUpdateResult> {
        let pending: Vec<InstalledResource> = self
            .store
            .list(kind)?
            .into_iter()
            .filter(|r| r.is_remote() && r.file_hash.is_none())
            .collect();
        let total = pending.len() as u32;
        if total == 0 {
            return Ok(BatchUpdateResult::default());
        }
        info!("[updates] Capturing baselines for {} {}(s)", total, kind);

        let results = run_bounded(
            &self.semaphore,
            pending,
            |resource| async move {
                match self.capture_baseline(&resource, token).await {
                    Ok(outcome) => UpdateExecuteResult::succeeded(outcome),
                    Err(e) => {
                        warn!("[updates] No baseline for {} {}: {}", kind, resource.id, e);
                        UpdateExecuteResult::failed(&resource.id, e)
                    }
                }
            },
            |result, completed| {
                self.emit(UpdateEvent::UpdateProgress {
                    resource_kind: kind,
                    id: result.id.clone(),
                    success: result.success,
                    completed,
                    total,
                });
            },
        )
        .await;

        Ok(BatchUpdateResult::from_results(results))
    }

    async fn capture_baseline(
        &self,
        resource: &InstalledResource,
        token: Option<&str>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let loc = resource
            .location()
            .ok_or_else(|| UpdateError::LocalOnly(resource.id.clone()))?;
        let mut quota = QuotaSnapshot::default();
        let resolution =
            resolve_fingerprint(self.remote.as_ref(), resource.kind, &loc, token, &mut quota).await?;

        if let Some(branch) = resolution.corrected_branch.as_deref() {
            self.store.set_branch(resource.kind, &resource.id, branch)?;
        }
        self.store
            .record_fingerprint(resource.kind, &resource.id, &resolution.value, None)?;
        Ok(UpdateOutcome {
            id: resource.id.clone(),
            new_hash: resolution.value,
            up_to_date: false,
            sync_failures: Vec::new(),
        })
    }
}
