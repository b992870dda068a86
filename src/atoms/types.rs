// ── AgentDeck Atoms: Types ─────────────────────────────────────────────────
// Records and DTOs shared by the engine and its callers. Field names on the
// wire are camelCase to match the desktop frontend.

use serde::{Deserialize, Serialize};

use super::error::{FetchError, FetchErrorKind};

// ── Resource identity ──────────────────────────────────────────────────────

/// The four installable resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Skill,
    Command,
    Hook,
    Agent,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [Self::Skill, Self::Command, Self::Hook, Self::Agent];

    /// Skills are directories with several files; everything else is one file.
    pub fn is_bundle(self) -> bool {
        matches!(self, Self::Skill)
    }

    /// Directory name used under the SSOT root and app config roots.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Skill => "skills",
            Self::Command => "commands",
            Self::Hook => "hooks",
            Self::Agent => "agents",
        }
    }

    /// Extension of the single-file form.
    pub fn file_extension(self) -> &'static str {
        match self {
            Self::Hook => "json",
            _ => "md",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skill => "skill",
            Self::Command => "command",
            Self::Hook => "hook",
            Self::Agent => "agent",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skill => write!(f, "Skill"),
            Self::Command => write!(f, "Command"),
            Self::Hook => write!(f, "Hook"),
            Self::Agent => write!(f, "Agent"),
        }
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().trim_end_matches('s') {
            "skill" => Ok(Self::Skill),
            "command" => Ok(Self::Command),
            "hook" => Ok(Self::Hook),
            "agent" => Ok(Self::Agent),
            _ => Err(format!("Unknown resource kind: {}", s)),
        }
    }
}

/// The client applications a resource can be fanned out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    Claude,
    Codex,
    Gemini,
}

impl AppType {
    pub const ALL: [AppType; 3] = [Self::Claude, Self::Codex, Self::Gemini];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }
}

impl std::fmt::Display for AppType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-application enablement of one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledApps {
    #[serde(default)]
    pub claude: bool,
    #[serde(default)]
    pub codex: bool,
    #[serde(default)]
    pub gemini: bool,
}

impl EnabledApps {
    pub fn is_enabled_for(&self, app: AppType) -> bool {
        match app {
            AppType::Claude => self.claude,
            AppType::Codex => self.codex,
            AppType::Gemini => self.gemini,
        }
    }

    pub fn set_enabled_for(&mut self, app: AppType, enabled: bool) {
        match app {
            AppType::Claude => self.claude = enabled,
            AppType::Codex => self.codex = enabled,
            AppType::Gemini => self.gemini = enabled,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = AppType> + '_ {
        AppType::ALL.into_iter().filter(|app| self.is_enabled_for(*app))
    }
}

// ── Installed resource record ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledResource {
    /// Unique within its kind: "namespace/filename" or "filename".
    pub id: String,
    pub kind: ResourceKind,
    pub name: String,
    pub repo_owner: Option<String>,
    pub repo_name: Option<String>,
    pub repo_branch: Option<String>,
    /// File (or bundle directory) inside the repository.
    pub source_path: Option<String>,
    /// Last-known remote fingerprint. Compared for equality only.
    pub file_hash: Option<String>,
    #[serde(default)]
    pub apps: EnabledApps,
    /// Epoch seconds. Immutable after install.
    pub installed_at: i64,
    /// Epoch seconds of the last successful update.
    pub last_updated_at: Option<i64>,
}

impl InstalledResource {
    /// Resources without an upstream repository are never checked.
    pub fn is_remote(&self) -> bool {
        self.repo_owner.as_deref().is_some_and(|s| !s.is_empty())
            && self.repo_name.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Upstream coordinates, or `None` for local-only resources.
    pub fn location(&self) -> Option<RemoteLocation> {
        if !self.is_remote() {
            return None;
        }
        Some(RemoteLocation {
            owner: self.repo_owner.clone().unwrap_or_default(),
            repo: self.repo_name.clone().unwrap_or_default(),
            branch: self
                .repo_branch
                .clone()
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| "main".to_string()),
            path: self
                .source_path
                .clone()
                .unwrap_or_else(|| default_source_path(self.kind, &self.id)),
        })
    }
}

/// Fallback repository path for records installed without `sourcePath`.
fn default_source_path(kind: ResourceKind, id: &str) -> String {
    if kind.is_bundle() {
        id.to_string()
    } else {
        format!("{}.{}", id, kind.file_extension())
    }
}

/// Where a resource lives upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub path: String,
}

impl RemoteLocation {
    pub fn on_branch(&self, branch: &str) -> Self {
        RemoteLocation { branch: branch.to_string(), ..self.clone() }
    }
}

impl std::fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}:{}", self.owner, self.repo, self.branch, self.path)
    }
}

// ── Remote API values ──────────────────────────────────────────────────────

/// Readout of the remote API's rate-limit headers for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub limit: u32,
    /// Epoch seconds.
    pub reset_at: i64,
}

/// A value returned by the remote client together with the quota state
/// reported on that same response.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub rate_limit: Option<RateLimitInfo>,
}

impl<T> Fetched<T> {
    pub fn new(value: T, rate_limit: Option<RateLimitInfo>) -> Self {
        Fetched { value, rate_limit }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched { value: f(self.value), rate_limit: self.rate_limit }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    pub sha: String,
    /// First line of the commit message.
    pub message: String,
    /// Epoch seconds of the author date.
    pub date: Option<i64>,
}

/// One file of fetched remote content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Path relative to the resource root (the file name for single files).
    pub path: String,
    pub content: Vec<u8>,
}

/// Full content of a resource plus the fingerprint it was fetched at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePayload {
    pub fingerprint: String,
    pub files: Vec<RemoteFile>,
}

// ── Update check DTOs ──────────────────────────────────────────────────────

/// Outcome of one change check. Exactly one variant holds per check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Unchanged,
    /// The record has no fingerprint yet; a baseline capture is due.
    NeedsBaseline { fingerprint: String },
    Updated {
        new_hash: String,
        commit: Option<CommitInfo>,
    },
    RemoteDeleted,
    Failed(FetchError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckResult {
    pub id: String,
    pub has_update: bool,
    pub new_hash: Option<String>,
    pub commit_message: Option<String>,
    /// Remote commit time, epoch seconds.
    pub updated_at: Option<i64>,
    pub remote_deleted: bool,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FetchErrorKind>,
    /// Set when the recorded branch was gone and the default branch was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_branch: Option<String>,
    /// True when the record has no fingerprint to compare against.
    #[serde(default)]
    pub needs_baseline: bool,
}

impl UpdateCheckResult {
    pub fn from_outcome(id: &str, outcome: CheckOutcome, corrected_branch: Option<String>) -> Self {
        let mut result = UpdateCheckResult {
            id: id.to_string(),
            has_update: false,
            new_hash: None,
            commit_message: None,
            updated_at: None,
            remote_deleted: false,
            error: None,
            error_kind: None,
            corrected_branch,
            needs_baseline: false,
        };
        match outcome {
            CheckOutcome::Unchanged => {}
            CheckOutcome::NeedsBaseline { .. } => result.needs_baseline = true,
            CheckOutcome::Updated { new_hash, commit } => {
                result.has_update = true;
                result.new_hash = Some(new_hash);
                if let Some(commit) = commit {
                    result.commit_message = Some(commit.message);
                    result.updated_at = commit.date;
                }
            }
            CheckOutcome::RemoteDeleted => result.remote_deleted = true,
            CheckOutcome::Failed(err) => {
                result.error_kind = Some(err.kind());
                result.error = Some(err.to_string());
            }
        }
        result
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckResult {
    pub success_count: u32,
    pub failed_count: u32,
    pub update_count: u32,
    pub deleted_count: u32,
    /// In completion order, not input order.
    pub results: Vec<UpdateCheckResult>,
    /// Lowest remaining quota seen on any response during the batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}

impl BatchCheckResult {
    /// Derive the summary counts by folding over `results`.
    pub fn from_results(results: Vec<UpdateCheckResult>, rate_limit: Option<RateLimitInfo>) -> Self {
        let mut batch = BatchCheckResult { rate_limit, ..Default::default() };
        for r in &results {
            if r.is_failure() {
                batch.failed_count += 1;
            } else {
                batch.success_count += 1;
                if r.has_update {
                    batch.update_count += 1;
                }
                if r.remote_deleted {
                    batch.deleted_count += 1;
                }
            }
        }
        batch.results = results;
        batch
    }
}

// ── Update execution DTOs ──────────────────────────────────────────────────

/// One application the update could not be propagated to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub app: AppType,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub id: String,
    pub new_hash: String,
    /// The remote already matched the recorded fingerprint; nothing written.
    pub up_to_date: bool,
    pub sync_failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExecuteResult {
    pub id: String,
    pub success: bool,
    pub new_hash: Option<String>,
    #[serde(default)]
    pub up_to_date: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub sync_failures: Vec<SyncFailure>,
}

impl UpdateExecuteResult {
    pub fn succeeded(outcome: UpdateOutcome) -> Self {
        UpdateExecuteResult {
            id: outcome.id,
            success: true,
            new_hash: Some(outcome.new_hash),
            up_to_date: outcome.up_to_date,
            error: None,
            sync_failures: outcome.sync_failures,
        }
    }

    pub fn failed(id: &str, error: impl std::fmt::Display) -> Self {
        UpdateExecuteResult {
            id: id.to_string(),
            success: false,
            new_hash: None,
            up_to_date: false,
            error: Some(error.to_string()),
            sync_failures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResult {
    pub success_count: u32,
    pub failed_count: u32,
    pub results: Vec<UpdateExecuteResult>,
}

impl BatchUpdateResult {
    pub fn from_results(results: Vec<UpdateExecuteResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count() as u32;
        BatchUpdateResult {
            success_count,
            failed_count: results.len() as u32 - success_count,
            results,
        }
    }
}

// ── Progress events ────────────────────────────────────────────────────────

/// Side-channel notifications for the UI while a batch runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UpdateEvent {
    #[serde(rename = "check_progress")]
    CheckProgress {
        resource_kind: ResourceKind,
        id: String,
        completed: u32,
        total: u32,
    },
    #[serde(rename = "update_progress")]
    UpdateProgress {
        resource_kind: ResourceKind,
        id: String,
        success: bool,
        completed: u32,
        total: u32,
    },
}

// ── Credential status ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub configured: bool,
    /// Only the last four characters survive redaction.
    pub redacted: Option<String>,
}
