// AgentDeck Engine — GitHub REST client
//
// A pure request/response mapper: one API call per lookup, no retries, no
// cached state. File bytes beyond the inline contents response (large
// files, every file of a bundle) come from the raw-content host, which does
// not count against the REST quota. The bearer header is attached only when
// a token is supplied.

use async_trait::async_trait;
use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::rate_limit::parse_rate_limit;
use super::wire::{
    bundle_entries, bundle_fingerprint, decode_base64, summary_line, CommitResponse,
    ContentsFile, RepoInfo, TreeResponse,
};
use super::RemoteRepo;
use crate::atoms::constants::GITHUB_ACCEPT;
use crate::atoms::error::{EngineResult, FetchError, FetchFailure};
use crate::atoms::types::{CommitInfo, Fetched, RemoteFile, RemoteLocation, ResourcePayload};
use crate::engine::config::UpdaterConfig;
use crate::engine::http::{build_client, classify_response};

pub struct GitHubClient {
    pub(crate) http: reqwest::Client,
    pub(crate) api_base: String,
    pub(crate) raw_base: String,
}

impl GitHubClient {
    pub fn new(config: &UpdaterConfig) -> EngineResult<Self> {
        Ok(GitHubClient {
            http: build_client(config)?,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
        })
    }

    /// GET with the GitHub accept header and, only if a token is given, the
    /// bearer header.
    pub(crate) fn request(&self, url: &str, token: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url).header(reqwest::header::ACCEPT, GITHUB_ACCEPT);
        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, url: &str, token: Option<&str>) -> Result<reqwest::Response, FetchFailure> {
        debug!("[github] GET {}", url);
        Ok(self.request(url, token).send().await?)
    }

    /// Classify a response and decode its JSON body. A body that does not
    /// match `T` is `Malformed` but still reports the response's quota.
    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Fetched<T>, FetchFailure> {
        let rate_limit = classify_response(response.status(), response.headers())?;
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::new(e.into(), rate_limit))?;
        let value = serde_json::from_slice(&body)
            .map_err(|e| FetchFailure::new(FetchError::Malformed(e.to_string()), rate_limit))?;
        Ok(Fetched::new(value, rate_limit))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<Fetched<T>, FetchFailure> {
        Self::read_json(self.send(url, token).await?).await
    }

    async fn get_raw(&self, url: &str, token: Option<&str>) -> Result<Fetched<Vec<u8>>, FetchFailure> {
        let response = self.send(url, token).await?;
        let rate_limit = classify_response(response.status(), response.headers())?;
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchFailure::new(e.into(), rate_limit))?;
        Ok(Fetched::new(body.to_vec(), rate_limit))
    }

    fn repo_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}",
            self.api_base,
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        )
    }

    fn contents_url(&self, loc: &RemoteLocation) -> String {
        format!(
            "{}/contents/{}?ref={}",
            self.repo_url(&loc.owner, &loc.repo),
            encode_path(&loc.path),
            urlencoding::encode(&loc.branch)
        )
    }

    /// Raw-content URL of `path` at `branch`.
    fn raw_url(&self, loc: &RemoteLocation, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base,
            urlencoding::encode(&loc.owner),
            urlencoding::encode(&loc.repo),
            encode_path(&loc.branch),
            encode_path(path)
        )
    }

    async fn get_tree(&self, loc: &RemoteLocation, token: Option<&str>) -> Result<Fetched<TreeResponse>, FetchFailure> {
        let url = format!(
            "{}/git/trees/{}?recursive=1",
            self.repo_url(&loc.owner, &loc.repo),
            urlencoding::encode(&loc.branch)
        );
        let tree: Fetched<TreeResponse> = self.get_json(&url, token).await?;
        if tree.value.truncated {
            return Err(FetchFailure::new(
                FetchError::Malformed(format!(
                    "tree listing for {}/{} is truncated",
                    loc.owner, loc.repo
                )),
                tree.rate_limit,
            ));
        }
        Ok(tree)
    }
}

/// Percent-encode each path segment, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject empty identifiers and paths that could escape the repository.
pub fn validate_location(loc: &RemoteLocation) -> Result<(), FetchError> {
    for (field, value) in [("owner", &loc.owner), ("repo", &loc.repo), ("branch", &loc.branch), ("path", &loc.path)] {
        if value.trim().is_empty() {
            return Err(FetchError::InvalidInput(format!("{} is empty", field)));
        }
    }
    validate_relative_path(&loc.path)
}

pub(crate) fn validate_relative_path(path: &str) -> Result<(), FetchError> {
    if path.starts_with('/') || path.contains('\\') {
        return Err(FetchError::InvalidInput(format!("path must be relative: {}", path)));
    }
    if path.split('/').any(|seg| seg == "..") {
        return Err(FetchError::InvalidInput(format!("path traversal rejected: {}", path)));
    }
    Ok(())
}

fn validate_repo(owner: &str, repo: &str) -> Result<(), FetchError> {
    if owner.trim().is_empty() || repo.trim().is_empty() {
        return Err(FetchError::InvalidInput("owner and repo must be non-empty".into()));
    }
    Ok(())
}

#[async_trait]
impl RemoteRepo for GitHubClient {
    async fn get_blob_fingerprint(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure> {
        validate_location(loc)?;
        let file: Fetched<ContentsFile> = self.get_json(&self.contents_url(loc), token).await?;
        if file.value.entry_type != "file" {
            return Err(FetchFailure::new(
                FetchError::Malformed(format!("{} is a {}, not a file", loc.path, file.value.entry_type)),
                file.rate_limit,
            ));
        }
        Ok(file.map(|f| f.sha))
    }

    async fn get_tree_fingerprint(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure> {
        validate_location(loc)?;
        let tree = self.get_tree(loc, token).await?;
        let entries = bundle_entries(&tree.value.tree, &loc.path);
        let fingerprint = bundle_fingerprint(&entries)
            .map_err(|e| FetchFailure::new(e, tree.rate_limit))?;
        Ok(Fetched::new(fingerprint, tree.rate_limit))
    }

    async fn get_latest_commit(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        token: Option<&str>,
    ) -> Result<Fetched<CommitInfo>, FetchFailure> {
        validate_repo(owner, repo)?;
        if branch.trim().is_empty() {
            return Err(FetchError::InvalidInput("branch is empty".into()).into());
        }
        let url = format!("{}/commits/{}", self.repo_url(owner, repo), urlencoding::encode(branch));
        let response = self.send(&url, token).await?;
        // GitHub answers an unknown ref with 422 "No commit found for SHA".
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let rate_limit = parse_rate_limit(response.headers());
            return Err(FetchFailure::new(FetchError::NotFound, rate_limit));
        }
        let commit: Fetched<CommitResponse> = Self::read_json(response).await?;
        Ok(commit.map(|c| CommitInfo {
            sha: c.sha,
            message: summary_line(&c.commit.message),
            date: c
                .commit
                .author
                .and_then(|a| chrono::DateTime::parse_from_rfc3339(&a.date).ok())
                .map(|d| d.timestamp()),
        }))
    }

    async fn get_default_branch(
        &self,
        owner: &str,
        repo: &str,
        token: Option<&str>,
    ) -> Result<Fetched<String>, FetchFailure> {
        validate_repo(owner, repo)?;
        let info: Fetched<RepoInfo> = self.get_json(&self.repo_url(owner, repo), token).await?;
        if info.value.default_branch.is_empty() {
            return Err(FetchFailure::new(
                FetchError::Malformed("empty default_branch".into()),
                info.rate_limit,
            ));
        }
        Ok(info.map(|i| i.default_branch))
    }

    async fn fetch_file(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<ResourcePayload>, FetchFailure> {
        validate_location(loc)?;
        let Fetched { value: file, mut rate_limit } =
            self.get_json::<ContentsFile>(&self.contents_url(loc), token).await?;
        if file.entry_type != "file" {
            return Err(FetchFailure::new(
                FetchError::Malformed(format!("{} is not a file", loc.path)),
                rate_limit,
            ));
        }

        let inline = match (file.encoding.as_deref(), file.content.as_deref()) {
            (Some("base64"), Some(content)) if !content.is_empty() => Some(
                decode_base64(content).map_err(|e| FetchFailure::new(e, rate_limit))?,
            ),
            _ => None,
        };
        // Files over 1 MB come back without inline content.
        let content = match (inline, file.download_url) {
            (Some(bytes), _) => bytes,
            (None, Some(url)) => {
                let raw = self.get_raw(&url, token).await?;
                rate_limit = raw.rate_limit.or(rate_limit);
                raw.value
            }
            (None, None) => Vec::new(),
        };

        let name = loc.path.rsplit('/').next().unwrap_or(&loc.path).to_string();
        Ok(Fetched::new(
            ResourcePayload {
                fingerprint: file.sha,
                files: vec![RemoteFile { path: name, content }],
            },
            rate_limit,
        ))
    }

    async fn fetch_bundle(
        &self,
        loc: &RemoteLocation,
        token: Option<&str>,
    ) -> Result<Fetched<ResourcePayload>, FetchFailure> {
        validate_location(loc)?;
        let Fetched { value: tree, mut rate_limit } = self.get_tree(loc, token).await?;
        let entries = bundle_entries(&tree.tree, &loc.path);
        let fingerprint =
            bundle_fingerprint(&entries).map_err(|e| FetchFailure::new(e, rate_limit))?;

        // One API call for the listing; file bytes come from the raw host.
        let prefix = format!("{}/", loc.path.trim_end_matches('/'));
        let mut files = Vec::with_capacity(entries.len());
        for entry in &entries {
            let relative = entry.path.strip_prefix(&prefix).unwrap_or(&entry.path).to_string();
            validate_relative_path(&relative)?;
            let raw = self
                .get_raw(&self.raw_url(loc, &entry.path), token)
                .await
                .map_err(|f| FetchFailure { rate_limit: f.rate_limit.or(rate_limit), ..f })?;
            rate_limit = raw.rate_limit.or(rate_limit);
            files.push(RemoteFile { path: relative, content: raw.value });
        }

        Ok(Fetched::new(ResourcePayload { fingerprint, files }, rate_limit))
    }
}
