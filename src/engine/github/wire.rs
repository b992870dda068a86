// GitHub REST response shapes. Only the fields the engine reads are declared;
// a response missing any of them fails deserialization and surfaces as
// FetchError::Malformed.

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::atoms::error::FetchError;

/// `GET /repos/{owner}/{repo}/contents/{path}?ref={branch}` for a file.
/// A directory path returns a JSON array and fails to parse here.
#[derive(Debug, Deserialize)]
pub(crate) struct ContentsFile {
    pub sha: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// `GET /repos/{owner}/{repo}/commits/{branch}`
#[derive(Debug, Deserialize)]
pub(crate) struct CommitResponse {
    pub sha: String,
    pub commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitDetail {
    pub message: String,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitAuthor {
    pub date: String,
}

/// `GET /repos/{owner}/{repo}`
#[derive(Debug, Deserialize)]
pub(crate) struct RepoInfo {
    pub default_branch: String,
}

/// `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1`
#[derive(Debug, Deserialize)]
pub(crate) struct TreeResponse {
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    pub sha: String,
}

/// `GET /rate_limit` body, used when the quota headers are absent.
#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub rate: RateLimitCore,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitCore {
    pub limit: u32,
    pub remaining: u32,
    pub reset: i64,
}

/// Decode a GitHub base64 payload (line-wrapped at 60 columns).
pub(crate) fn decode_base64(content: &str) -> Result<Vec<u8>, FetchError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, compact)
        .map_err(|e| FetchError::Malformed(format!("invalid base64 content: {}", e)))
}

/// Blob entries under `dir`, sorted by path.
pub(crate) fn bundle_entries(tree: &[TreeEntry], dir: &str) -> Vec<TreeEntry> {
    let dir = dir.trim_end_matches('/');
    let prefix = format!("{}/", dir);
    let mut blobs: Vec<TreeEntry> = tree
        .iter()
        .filter(|e| e.entry_type == "blob")
        .filter(|e| dir.is_empty() || e.path.starts_with(&prefix))
        .cloned()
        .collect();
    blobs.sort_by(|a, b| a.path.cmp(&b.path));
    blobs
}

/// SHA-256 over the concatenated blob identifiers of a sorted listing.
/// Any single file changing upstream changes the result.
pub(crate) fn bundle_fingerprint(entries: &[TreeEntry]) -> Result<String, FetchError> {
    if entries.is_empty() {
        return Err(FetchError::NotFound);
    }
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.sha.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// First line of a commit message.
pub(crate) fn summary_line(message: &str) -> String {
    message.lines().next().unwrap_or("").trim().to_string()
}
