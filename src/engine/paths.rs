// engine/paths.rs — Filesystem locations used by the engine.
// Every component also accepts an explicit root so tests never touch $HOME.

use std::path::PathBuf;

use crate::atoms::types::AppType;

/// `<data_dir>/agentdeck`, falling back to the working directory on
/// platforms without a data dir.
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agentdeck")
}

/// The engine's SQLite database.
pub fn engine_db_path() -> PathBuf {
    data_dir().join("agentdeck.db")
}

/// Root of the single-source-of-truth copy of every installed resource.
pub fn ssot_root() -> PathBuf {
    data_dir().join("ssot")
}

/// Config root of one client application (`~/.claude`, `~/.codex`, `~/.gemini`).
pub fn app_config_root(app: AppType) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    match app {
        AppType::Claude => home.join(".claude"),
        AppType::Codex => home.join(".codex"),
        AppType::Gemini => home.join(".gemini"),
    }
}
