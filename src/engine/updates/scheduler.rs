// Batch scheduler: every batch (checks, updates, baseline capture) runs
// through the engine's shared semaphore, so at most
// MAX_CONCURRENT_REQUESTS resources are in flight across all batches.
// Results come back in completion order.

use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::future::Future;
use tokio::sync::Semaphore;

use super::UpdateEngine;
use crate::atoms::constants::MAX_CONCURRENT_REQUESTS;
use crate::atoms::error::EngineResult;
use crate::atoms::types::{BatchCheckResult, InstalledResource, ResourceKind, UpdateEvent};
use crate::engine::github::{quota_warning, QuotaSnapshot};

/// Run `op` over `items`, holding a permit of `semaphore` for each one.
/// `on_done` sees every result as it completes, with the running count.
/// Dropping the returned future abandons unfinished items without a result.
pub(crate) async fn run_bounded<I, T, F, Fut>(
    semaphore: &Semaphore,
    items: Vec<I>,
    op: F,
    mut on_done: impl FnMut(&T, u32),
) -> Vec<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    let mut pending = stream::iter(items.into_iter().map(|item| {
        let fut = op(item);
        async move {
            let _permit = semaphore.acquire().await.ok();
            fut.await
        }
    }))
    .buffer_unordered(MAX_CONCURRENT_REQUESTS);

    let mut results = Vec::new();
    while let Some(result) = pending.next().await {
        on_done(&result, results.len() as u32 + 1);
        results.push(result);
    }
    results
}

impl UpdateEngine {
    /// Check a set of records. Local-only records are skipped; one record's
    /// failure never affects the others.
    pub async fn check_resources(
        &self,
        resources: Vec<InstalledResource>,
        token: Option<&str>,
    ) -> BatchCheckResult {
        let remote: Vec<_> = resources.into_iter().filter(|r| r.is_remote()).collect();
        let total = remote.len() as u32;

        let outcomes = run_bounded(
            &self.semaphore,
            remote,
            |resource| async move {
                let (result, quota) = self.check_resource(&resource, token).await;
                (resource.kind, result, quota)
            },
            |(kind, result, _), completed| {
                self.emit(UpdateEvent::CheckProgress {
                    resource_kind: *kind,
                    id: result.id.clone(),
                    completed,
                    total,
                });
            },
        )
        .await;

        let mut quota = QuotaSnapshot::default();
        let mut results = Vec::with_capacity(outcomes.len());
        for (_, result, seen) in outcomes {
            quota = quota.merge(seen);
            results.push(result);
        }

        let batch = BatchCheckResult::from_results(results, quota.get());
        info!(
            "[updates] Checked {}: {} ok, {} failed, {} updates, {} deleted",
            total, batch.success_count, batch.failed_count, batch.update_count, batch.deleted_count
        );
        if let Some(warning) = batch.rate_limit.as_ref().and_then(quota_warning) {
            warn!("[updates] {}", warning);
        }
        batch
    }

    /// Check every installed resource of `kind`.
    pub async fn check_all(&self, kind: ResourceKind, token: Option<&str>) -> EngineResult<BatchCheckResult> {
        let resources = self.store.list(kind)?;
        Ok(self.check_resources(resources, token).await)
    }

    /// Check the given ids only. Unknown ids are skipped.
    pub async fn check_by_ids(
        &self,
        kind: ResourceKind,
        ids: &[String],
        token: Option<&str>,
    ) -> EngineResult<BatchCheckResult> {
        let resources: Vec<_> = self
            .store
            .list(kind)?
            .into_iter()
            .filter(|r| ids.contains(&r.id))
            .collect();
        for id in ids {
            if !resources.iter().any(|r| &r.id == id) {
                warn!("[updates] Skipping unknown {} '{}'", kind, id);
            }
        }
        Ok(self.check_resources(resources, token).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::error::FetchError;
    use crate::atoms::types::RateLimitInfo;
    use crate::engine::updates::testing::{local_resource, resource, FakeRemote};
    use crate::engine::updates::tests::engine_with;
    use std::time::Duration;

    #[tokio::test]
    async fn one_failure_does_not_sink_the_batch() {
        let info = RateLimitInfo { remaining: 0, limit: 60, reset_at: 1_700_003_600 };
        let remote = FakeRemote::new()
            .with_blob("main", "skills/r1.md", "a")
            .with_error("main", "skills/r2.md", FetchError::RateLimited(Some(info)))
            .with_blob("main", "skills/r3.md", "c2");
        let (engine, _, _dir) = engine_with(remote);
        let batch = engine
            .check_resources(
                vec![resource("r1", Some("a")), resource("r2", Some("b")), resource("r3", Some("c"))],
                None,
            )
            .await;

        assert_eq!(batch.success_count, 2);
        assert_eq!(batch.failed_count, 1);
        assert_eq!(batch.update_count, 1);
        assert_eq!(batch.rate_limit, Some(info));
        let by_id = |id: &str| batch.results.iter().find(|r| r.id == id).unwrap().clone();
        assert!(!by_id("r1").has_update && by_id("r1").error.is_none());
        assert!(by_id("r2").error.is_some());
        assert_eq!(by_id("r3").new_hash.as_deref(), Some("c2"));
    }

    #[tokio::test]
    async fn deleted_only_batch_still_reports_quota() {
        let remote = FakeRemote::new().with_quota_countdown(40);
        let (engine, _, _dir) = engine_with(remote);
        let batch = engine
            .check_resources(vec![resource("r1", Some("a")), resource("r2", Some("b"))], None)
            .await;

        assert!(batch.results.iter().all(|r| r.remote_deleted));
        // three 404s per resource
        assert_eq!(batch.rate_limit.map(|q| q.remaining), Some(34));
    }

    #[tokio::test]
    async fn never_more_than_five_in_flight() {
        let mut remote = FakeRemote::new().with_delay(Duration::from_millis(20));
        let mut resources = Vec::new();
        for i in 0..12 {
            let id = format!("r{}", i);
            remote = remote.with_blob("main", &format!("skills/{}.md", id), "h");
            resources.push(resource(&id, Some("h")));
        }
        let (engine, remote, _dir) = engine_with(remote);
        let batch = engine.check_resources(resources, None).await;

        assert_eq!(batch.results.len(), 12);
        assert_eq!(batch.success_count, 12);
        assert!(remote.max_in_flight() <= MAX_CONCURRENT_REQUESTS);
        assert!(remote.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn concurrent_batches_share_the_ceiling() {
        let mut remote = FakeRemote::new().with_delay(Duration::from_millis(20));
        let mut a = Vec::new();
        let mut b = Vec::new();
        for i in 0..8 {
            let id = format!("r{}", i);
            remote = remote.with_blob("main", &format!("skills/{}.md", id), "h");
            if i % 2 == 0 {
                a.push(resource(&id, Some("h")));
            } else {
                b.push(resource(&id, Some("h")));
            }
        }
        let (engine, remote, _dir) = engine_with(remote);
        let (x, y) = tokio::join!(engine.check_resources(a, None), engine.check_resources(b, None));
        assert_eq!(x.results.len() + y.results.len(), 8);
        assert!(remote.max_in_flight() <= MAX_CONCURRENT_REQUESTS);
    }

    #[tokio::test]
    async fn local_only_resources_are_skipped() {
        let remote = FakeRemote::new().with_blob("main", "skills/r1.md", "a");
        let (engine, remote, _dir) = engine_with(remote);
        let batch = engine
            .check_resources(vec![resource("r1", Some("a")), local_resource("mine")], None)
            .await;
        assert_eq!(batch.results.len(), 1);
        assert_eq!(remote.calls().len(), 1);
    }

    #[tokio::test]
    async fn progress_events_count_up() {
        let remote = FakeRemote::new()
            .with_blob("main", "skills/r1.md", "a")
            .with_blob("main", "skills/r2.md", "b");
        let (engine, _, _dir) = engine_with(remote);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let engine = engine.with_events(tx);
        engine
            .check_resources(vec![resource("r1", Some("a")), resource("r2", Some("b"))], None)
            .await;

        let mut completed = Vec::new();
        while let Ok(UpdateEvent::CheckProgress { completed: n, total, .. }) = rx.try_recv() {
            assert_eq!(total, 2);
            completed.push(n);
        }
        assert_eq!(completed, vec![1, 2]);
    }

    #[tokio::test]
    async fn closed_event_channel_is_ignored() {
        let remote = FakeRemote::new().with_blob("main", "skills/r1.md", "a");
        let (engine, _, _dir) = engine_with(remote);
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let engine = engine.with_events(tx);
        let batch = engine.check_resources(vec![resource("r1", Some("a"))], None).await;
        assert_eq!(batch.success_count, 1);
    }

    #[tokio::test]
    async fn check_by_ids_filters_and_persists_branch_fix() {
        let remote = FakeRemote::new()
            .with_default_branch("master")
            .with_blob("master", "skills/r1.md", "a")
            .with_blob("master", "skills/r2.md", "b");
        let (engine, _, _dir) = engine_with(remote);
        engine.store.upsert(&resource("r1", Some("a"))).unwrap();
        engine.store.upsert(&resource("r2", Some("b"))).unwrap();

        let batch = engine
            .check_by_ids(ResourceKind::Command, &["r1".to_string(), "nope".to_string()], None)
            .await
            .unwrap();
        assert_eq!(batch.results.len(), 1);
        assert_eq!(batch.results[0].corrected_branch.as_deref(), Some("master"));

        let stored = engine.store.get(ResourceKind::Command, "r1").unwrap().unwrap();
        assert_eq!(stored.repo_branch.as_deref(), Some("master"));
        assert_eq!(stored.file_hash.as_deref(), Some("a"));
        let untouched = engine.store.get(ResourceKind::Command, "r2").unwrap().unwrap();
        assert_eq!(untouched.repo_branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn abandoned_batch_records_nothing() {
        let mut remote = FakeRemote::new()
            .with_delay(Duration::from_secs(30))
            .with_default_branch("master");
        for i in 0..3 {
            remote = remote.with_blob("master", &format!("skills/r{}.md", i), "h");
        }
        let (engine, remote, _dir) = engine_with(remote);
        for i in 0..3 {
            engine.store.upsert(&resource(&format!("r{}", i), Some("h"))).unwrap();
        }
        let run = engine.check_all(ResourceKind::Command, None);
        assert!(tokio::time::timeout(Duration::from_millis(50), run).await.is_err());
        assert!(!remote.calls().is_empty());
        for r in engine.store.list(ResourceKind::Command).unwrap() {
            assert_eq!(r.repo_branch.as_deref(), Some("main"));
        }
    }
}
