// AgentDeck Engine — Record Store
// Installed-resource records and engine key/value config in SQLite via
// rusqlite. The update engine only sees the `ResourceStore` trait.
//
// Module layout:
//   schema     — idempotent migrations
//   resources  — installed_resources CRUD + fingerprint/branch writes
//   kv         — engine_config key/value store

use crate::atoms::error::EngineResult;
use crate::atoms::types::{InstalledResource, ResourceKind};
use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

mod kv;
mod resources;
mod schema;

/// Record access used by the update engine. Each record is keyed by
/// `(kind, id)`; writes touch exactly one record.
pub trait ResourceStore: Send + Sync {
    /// All installed resources of one kind.
    fn list(&self, kind: ResourceKind) -> EngineResult<Vec<InstalledResource>>;

    fn get(&self, kind: ResourceKind, id: &str) -> EngineResult<Option<InstalledResource>>;

    /// Insert or replace a whole record (install / import paths).
    fn upsert(&self, resource: &InstalledResource) -> EngineResult<()>;

    /// Returns whether a record was removed.
    fn delete(&self, kind: ResourceKind, id: &str) -> EngineResult<bool>;

    /// Persist a new fingerprint. `updated_at` is set only by a successful
    /// update; baseline capture passes `None` and leaves it untouched.
    fn record_fingerprint(
        &self,
        kind: ResourceKind,
        id: &str,
        file_hash: &str,
        updated_at: Option<i64>,
    ) -> EngineResult<()>;

    /// Persist a branch correction found by the branch resolver.
    fn set_branch(&self, kind: ResourceKind, id: &str, branch: &str) -> EngineResult<()>;
}

/// Thread-safe database wrapper.
pub struct EngineStore {
    /// The SQLite connection, protected by a Mutex.
    pub conn: Mutex<Connection>,
}

impl EngineStore {
    /// Open (or create) the engine database and initialize tables.
    pub fn open(path: &Path) -> EngineResult<Self> {
        info!("[store] Opening engine store at {:?}", path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        schema::run_migrations(&conn)?;
        Ok(EngineStore { conn: Mutex::new(conn) })
    }

    /// Open the database at the default data-dir location.
    pub fn open_default() -> EngineResult<Self> {
        Self::open(&crate::engine::paths::engine_db_path())
    }

    /// Fresh in-memory database with the full schema.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        schema::run_migrations(&conn)?;
        Ok(EngineStore { conn: Mutex::new(conn) })
    }
}
