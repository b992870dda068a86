// Update executor: fetch full content into memory, then write the SSOT, then
// the record, then fan out to apps. Nothing local changes until the fetch
// has fully succeeded.

use log::{error, info, warn};
use std::collections::HashSet;

use super::resolver::resolve_content;
use super::scheduler::run_bounded;
use super::UpdateEngine;
use crate::atoms::error::UpdateError;
use crate::atoms::types::{
    BatchUpdateResult, ResourceKind, SyncFailure, UpdateEvent, UpdateExecuteResult, UpdateOutcome,
};
use crate::engine::github::{quota_warning, QuotaSnapshot};

impl UpdateEngine {
    /// Bring one resource up to its remote content.
    pub async fn update(
        &self,
        kind: ResourceKind,
        id: &str,
        token: Option<&str>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let _permit = self.semaphore.acquire().await.ok();
        self.apply_update(kind, id, token).await
    }

    async fn apply_update(
        &self,
        kind: ResourceKind,
        id: &str,
        token: Option<&str>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let record = self
            .store
            .get(kind, id)?
            .ok_or_else(|| UpdateError::UnknownResource(id.to_string()))?;
        let loc = record.location().ok_or_else(|| UpdateError::LocalOnly(id.to_string()))?;

        let mut quota = QuotaSnapshot::default();
        let fetched = resolve_content(self.remote.as_ref(), kind, &loc, token, &mut quota).await;
        if let Some(warning) = quota.get().as_ref().and_then(quota_warning) {
            warn!("[updates] {}", warning);
        }
        let resolution = fetched?;

        if let Some(branch) = resolution.corrected_branch.as_deref() {
            self.store.set_branch(kind, id, branch)?;
        }
        let payload = resolution.value;

        if record.file_hash.as_deref() == Some(payload.fingerprint.as_str()) && self.ssot.exists(kind, id) {
            info!("[updates] {} {} already at {}", kind, id, payload.fingerprint);
            return Ok(UpdateOutcome {
                id: id.to_string(),
                new_hash: payload.fingerprint,
                up_to_date: true,
                sync_failures: Vec::new(),
            });
        }

        self.ssot
            .write(kind, id, &payload.files)
            .inspect_err(|e| error!("[updates] SSOT write for {} {} failed: {}", kind, id, e))?;
        self.store
            .record_fingerprint(kind, id, &payload.fingerprint, Some(chrono::Utc::now().timestamp()))
            .inspect_err(|e| error!("[updates] Recording {} {} failed: {}", kind, id, e))?;

        let mut sync_failures = Vec::new();
        for app in record.apps.enabled() {
            if let Err(e) = self.sink.apply(kind, id, app, &payload) {
                warn!("[updates] Sync of {} {} to {} failed: {}", kind, id, app, e);
                sync_failures.push(SyncFailure { app, error: e.to_string() });
            }
        }

        info!("[updates] Updated {} {} to {}", kind, id, payload.fingerprint);
        Ok(UpdateOutcome {
            id: id.to_string(),
            new_hash: payload.fingerprint,
            up_to_date: false,
            sync_failures,
        })
    }

    /// Update several resources of one kind. Duplicate ids run once.
    pub async fn update_batch(
        &self,
        kind: ResourceKind,
        ids: &[String],
        token: Option<&str>,
    ) -> BatchUpdateResult {
        let mut seen = HashSet::new();
        let unique: Vec<&str> = ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();
        let total = unique.len() as u32;

        let results = run_bounded(
            &self.semaphore,
            unique,
            |id| async move {
                match self.apply_update(kind, id, token).await {
                    Ok(outcome) => UpdateExecuteResult::succeeded(outcome),
                    Err(e) => {
                        warn!("[updates] Update of {} {} failed: {}", kind, id, e);
                        UpdateExecuteResult::failed(id, e)
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

        let batch = BatchUpdateResult::from_results(results);
        info!("[updates] Updated {}: {} ok, {} failed", total, batch.success_count, batch.failed_count);
        batch
    }
}
