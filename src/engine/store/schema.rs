// Database schema and migrations for the engine store.
// Adding a table or column: append an idempotent CREATE TABLE IF NOT EXISTS
// or ALTER TABLE … ADD COLUMN (errors swallowed) at the end of
// run_migrations() — never modify existing SQL.

use crate::atoms::error::EngineResult;
use rusqlite::Connection;

pub(crate) fn run_migrations(conn: &Connection) -> EngineResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS installed_resources (
            kind TEXT NOT NULL,
            id TEXT NOT NULL,
            name TEXT NOT NULL DEFAULT '',
            repo_owner TEXT,
            repo_name TEXT,
            repo_branch TEXT,
            source_path TEXT,
            file_hash TEXT,
            apps TEXT NOT NULL DEFAULT '{}',
            installed_at INTEGER NOT NULL,
            last_updated_at INTEGER,
            PRIMARY KEY (kind, id)
        );

        CREATE TABLE IF NOT EXISTS engine_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}
