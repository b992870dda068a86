// AgentDeck — resource manager for AI coding-assistant CLIs.
//
// Installs Skills, Commands, Hooks and Agents from GitHub repositories into
// one local source-of-truth copy, fans that copy out to Claude Code, Codex
// and Gemini CLI config directories, and keeps it in step with upstream.
//
// Layers:
//   atoms   — pure constants, errors and DTOs
//   engine  — GitHub client, stores, app sync and the update engine

pub mod atoms;
pub mod engine;

pub use atoms::error::{
    ApplyError, EngineError, EngineResult, FetchError, FetchErrorKind, FetchFailure, UpdateError,
};
pub use atoms::types::*;
pub use engine::config::UpdaterConfig;
pub use engine::credentials::{KeychainKey, StaticKey, TokenStore, VaultKeySource};
pub use engine::github::{quota_warning, GitHubClient, QuotaSnapshot, RemoteRepo};
pub use engine::ssot::SsotStore;
pub use engine::store::{EngineStore, ResourceStore};
pub use engine::sync::{ConfigSink, DirectorySink};
pub use engine::updates::UpdateEngine;
