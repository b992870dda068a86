// Scripted RemoteRepo and ConfigSink doubles shared by the update engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use crate::atoms::error::{ApplyError, FetchError, FetchFailure};
use crate::atoms::types::*;
use crate::engine::github::RemoteRepo;
use crate::engine::sync::ConfigSink;

pub fn loc(branch: &str) -> RemoteLocation {
    RemoteLocation {
        owner: "acme".into(),
        repo: "skills".into(),
        branch: branch.into(),
        path: "skills/r1.md".into(),
    }
}

/// A remote command `id` at `skills/<id>.md` on `main`.
pub fn resource(id: &str, file_hash: Option<&str>) -> InstalledResource {
    InstalledResource {
        id: id.into(),
        kind: ResourceKind::Command,
        name: id.into(),
        repo_owner: Some("acme".into()),
        repo_name: Some("skills".into()),
        repo_branch: Some("main".into()),
        source_path: Some(format!("skills/{}.md", id)),
        file_hash: file_hash.map(str::to_string),
        apps: EnabledApps { claude: true, codex: false, gemini: false },
        installed_at: 1_700_000_000,
        last_updated_at: None,
    }
}

pub fn local_resource(id: &str) -> InstalledResource {
    InstalledResource {
        repo_owner: None,
        repo_name: None,
        repo_branch: None,
        source_path: None,
        ..resource(id, Some("local"))
    }
}

#[derive(Debug, Clone)]
struct Entry {
    sha: String,
    files: Vec<RemoteFile>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeRemote {
    entries: Mutex<HashMap<(String, String), Entry>>,
    errors: Mutex<HashMap<(String, String), FetchError>>,
    content_errors: Mutex<HashMap<(String, String), FetchError>>,
    branches: Mutex<HashSet<String>>,
    default_branch: Mutex<Option<String>>,
    commit_error: Mutex<Option<FetchError>>,
    quota: Option<AtomicU32>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// File at `path` on `branch` with content equal to the sha; the branch
    /// is marked live.
    pub fn with_blob(self, branch: &str, path: &str, sha: &str) -> Self {
        self.set_blob(branch, path, sha);
        self
    }

    pub fn with_bundle(self, branch: &str, dir: &str, sha: &str, files: Vec<RemoteFile>) -> Self {
        self.branches.lock().insert(branch.to_string());
        self.entries
            .lock()
            .insert((branch.into(), dir.into()), Entry { sha: sha.into(), files });
        self
    }

    pub fn with_branch(self, branch: &str) -> Self {
        self.branches.lock().insert(branch.to_string());
        self
    }

    pub fn with_default_branch(self, branch: &str) -> Self {
        *self.default_branch.lock() = Some(branch.to_string());
        self
    }

    pub fn with_error(self, branch: &str, path: &str, err: FetchError) -> Self {
        self.errors.lock().insert((branch.into(), path.into()), err);
        self
    }

    pub fn with_content_error(self, branch: &str, path: &str, err: FetchError) -> Self {
        self.content_errors.lock().insert((branch.into(), path.into()), err);
        self
    }

    pub fn with_commit_error(self, err: FetchError) -> Self {
        *self.commit_error.lock() = Some(err);
        self
    }

    /// Every response reports one less remaining request, starting below `start`.
    pub fn with_quota_countdown(mut self, start: u32) -> Self {
        self.quota = Some(AtomicU32::new(start));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_blob(&self, branch: &str, path: &str, sha: &str) {
        self.branches.lock().insert(branch.to_string());
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        let files = vec![RemoteFile { path: name, content: sha.as_bytes().to_vec() }];
        self.entries
            .lock()
            .insert((branch.into(), path.into()), Entry { sha: sha.into(), files });
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, call: String) -> InFlight<'_> {
        self.calls.lock().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        guard
    }

    fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.quota.as_ref().map(|q| RateLimitInfo {
            remaining: q.fetch_sub(1, Ordering::SeqCst).saturating_sub(1),
            limit: 60,
            reset_at: 1_700_003_600,
        })
    }

    /// Failures report the countdown reading like any other response.
    fn fail(&self, err: FetchError, rate_limit: Option<RateLimitInfo>) -> FetchFailure {
        let rate_limit = rate_limit.or_else(|| err.rate_limit().copied());
        FetchFailure::new(err, rate_limit)
    }

    fn lookup(&self, loc: &RemoteLocation, content: bool) -> Result<Fetched<Entry>, FetchFailure> {
        let key = (loc.branch.clone(), loc.path.clone());
        let rate_limit = self.rate_limit();
        if content {
            if let Some(err) = self.content_errors.lock().get(&key).cloned() {
                return Err(self.fail(err, rate_limit));
            }
        }
        if let Some(err) = self.errors.lock().get(&key).cloned() {
            return Err(self.fail(err, rate_limit));
        }
        match self.entries.lock().get(&key) {
            Some(entry) => Ok(Fetched::new(entry.clone(), rate_limit)),
            None => Err(self.fail(FetchError::NotFound, rate_limit)),
        }
    }
}

#[async_trait]
impl RemoteRepo for FakeRemote {
    async fn get_blob_fingerprint(
        &self,
        loc: &RemoteLocation,
        _token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure> {
        let _g = self.enter(format!("blob {} {}", loc.branch, loc.path)).await;
        Ok(self.lookup(loc, false)?.map(|e| e.sha))
    }

    async fn get_tree_fingerprint(
        &self,
        loc: &RemoteLocation,
        _token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure> {
        let _g = self.enter(format!("tree {} {}", loc.branch, loc.path)).await;
        Ok(self.lookup(loc, false)?.map(|e| e.sha))
    }

    async fn get_latest_commit(
        &self,
        _owner: &str,
        _repo: &str,
        branch: &str,
        _token: Option<&str>,
    ) -> Result<Fetched<CommitInfo>, FetchFailure> {
        let _g = self.enter(format!("commit {}", branch)).await;
        let rate_limit = self.rate_limit();
        if let Some(err) = self.commit_error.lock().clone() {
            return Err(self.fail(err, rate_limit));
        }
        if !self.branches.lock().contains(branch) {
            return Err(self.fail(FetchError::NotFound, rate_limit));
        }
        Ok(Fetched::new(
            CommitInfo {
                sha: format!("c-{}", branch),
                message: format!("Update {}", branch),
                date: Some(1_700_001_000),
            },
            rate_limit,
        ))
    }

    async fn get_default_branch(
        &self,
        _owner: &str,
        _repo: &str,
        _token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure> {
        let _g = self.enter("default".to_string()).await;
        let rate_limit = self.rate_limit();
        match self.default_branch.lock().clone() {
            Some(branch) => Ok(Fetched::new(branch, rate_limit)),
            None => Err(self.fail(FetchError::NotFound, rate_limit)),
        }
    }

    async fn fetch_file(
        &self,
        loc: &RemoteLocation,
        _token: Option<&str>,
    ) -> Result<Fetched<ResourcePayload>, FetchFailure> {
        let _g = self.enter(format!("file {} {}", loc.branch, loc.path)).await;
        Ok(self
            .lookup(loc, true)?
            .map(|e| ResourcePayload { fingerprint: e.sha, files: e.files }))
    }

    async fn fetch_bundle(
        &self,
        loc: &RemoteLocation,
        _token: Option<&str>,
    ) -> Result<Fetched<ResourcePayload>, FetchFailure> {
        let _g = self.enter(format!("bundle {} {}", loc.branch, loc.path)).await;
        Ok(self
            .lookup(loc, true)?
            .map(|e| ResourcePayload { fingerprint: e.sha, files: e.files }))
    }
}

/// Records every apply; apps listed in `failing` return an error.
#[derive(Default)]
pub struct RecordingSink {
    pub applied: Mutex<Vec<(ResourceKind, String, AppType)>>,
    pub failing: Vec<AppType>,
}

impl RecordingSink {
    pub fn failing(apps: &[AppType]) -> Self {
        RecordingSink { applied: Mutex::new(Vec::new()), failing: apps.to_vec() }
    }
}

impl ConfigSink for RecordingSink {
    fn apply(
        &self,
        kind: ResourceKind,
        id: &str,
        app: AppType,
        _payload: &ResourcePayload,
    ) -> Result<(), ApplyError> {
        if self.failing.contains(&app) {
            return Err(ApplyError::AppUnavailable { app: app.to_string() });
        }
        self.applied.lock().push((kind, id.to_string(), app));
        Ok(())
    }
}
