// AgentDeck Engine — Remote Fingerprint Client
//
// Talks to the GitHub REST API to obtain content-addressed identifiers for
// installed resources, commit metadata, default branches and full content.
//
//   client      — GitHubClient, the reqwest-backed RemoteRepo
//   wire        — strict response shapes (anything else is Malformed)
//   rate_limit  — header parsing, quota folding, token validation, warnings

use async_trait::async_trait;

use crate::atoms::error::FetchFailure;
use crate::atoms::types::{CommitInfo, Fetched, RemoteLocation, ResourcePayload};

pub(crate) mod client;
pub(crate) mod rate_limit;
pub(crate) mod wire;

pub use client::{validate_location, GitHubClient};
pub use rate_limit::{quota_warning, QuotaSnapshot};

/// The remote repository API as seen by the update engine.
///
/// Every method takes the credential explicitly; `None` means an
/// unauthenticated request. Implementations must not retry. Failures carry
/// the rate-limit readout of the failing response when it had one.
#[async_trait]
pub trait RemoteRepo: Send + Sync {
    /// Blob identifier of a single file at `loc.branch`.
    async fn get_blob_fingerprint(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure>;

    /// Composite fingerprint over every blob under the directory `loc.path`.
    async fn get_tree_fingerprint(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure>;

    /// Head commit of `branch`. Fails with `NotFound` when the branch is gone.
    async fn get_latest_commit(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<Fetched<CommitInfo>, FetchFailure>;

    async fn get_default_branch(
        &self,
        owner: &str,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure>;

    /// Full content of a single file, with the blob identifier it was read at.
    async fn fetch_file(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<ResourcePayload>, FetchFailure>;

    /// Every file under the directory `loc.path`, with the composite
    /// fingerprint of the listing the files were read from.
    async fn fetch_bundle(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<ResourcePayload>, FetchFailure>;
}
