use log::{debug, warn};
use rusqlite::{params, Row};

use super::{EngineStore, ResourceStore};
use crate::atoms::error::{EngineError, EngineResult};
use crate::atoms::types::{EnabledApps, InstalledResource, ResourceKind};

// ── DB Storage for Installed Resources ─────────────────────────────────

const SELECT_COLUMNS: &str = "SELECT kind, id, name, repo_owner, repo_name, repo_branch, source_path,
        file_hash, apps, installed_at, last_updated_at
     FROM installed_resources";

fn row_to_resource(row: &Row<'_>) -> rusqlite::Result<InstalledResource> {
    let kind_str: String = row.get(0)?;
    let kind = kind_str.parse::<ResourceKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
    })?;
    let apps_json: String = row.get::<_, String>(8).unwrap_or_else(|_| "{}".to_string());
    let apps: EnabledApps = serde_json::from_str(&apps_json).unwrap_or_default();
    Ok(InstalledResource {
        kind,
        id: row.get(1)?,
        name: row.get(2)?,
        repo_owner: row.get(3)?,
        repo_name: row.get(4)?,
        repo_branch: row.get(5)?,
        source_path: row.get(6)?,
        file_hash: row.get(7)?,
        apps,
        installed_at: row.get(9)?,
        last_updated_at: row.get(10)?,
    })
}

impl ResourceStore for EngineStore {
    fn list(&self, kind: ResourceKind) -> EngineResult<Vec<InstalledResource>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{} WHERE kind = ?1 ORDER BY id", SELECT_COLUMNS))?;
        let resources = stmt
            .query_map(params![kind.as_str()], row_to_resource)?
            .filter_map(|r| match r {
                Ok(resource) => Some(resource),
                Err(e) => {
                    warn!("[store] Skipping unreadable {} row: {}", kind, e);
                    None
                }
            })
            .collect();
        Ok(resources)
    }

    fn get(&self, kind: ResourceKind, id: &str) -> EngineResult<Option<InstalledResource>> {
        let conn = self.conn.lock();
        let result = conn.query_row(
            &format!("{} WHERE kind = ?1 AND id = ?2", SELECT_COLUMNS),
            params![kind.as_str(), id],
            row_to_resource,
        );
        match result {
            Ok(resource) => Ok(Some(resource)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn upsert(&self, resource: &InstalledResource) -> EngineResult<()> {
        if resource.id.is_empty() {
            return Err(EngineError::Other("resource id must be non-empty".into()));
        }
        let apps_json = serde_json::to_string(&resource.apps)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO installed_resources (kind, id, name, repo_owner, repo_name, repo_branch,
                 source_path, file_hash, apps, installed_at, last_updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(kind, id) DO UPDATE SET name=?3, repo_owner=?4, repo_name=?5,
                 repo_branch=?6, source_path=?7, file_hash=?8, apps=?9, last_updated_at=?11",
            params![
                resource.kind.as_str(),
                resource.id,
                resource.name,
                resource.repo_owner,
                resource.repo_name,
                resource.repo_branch,
                resource.source_path,
                resource.file_hash,
                apps_json,
                resource.installed_at,
                resource.last_updated_at,
            ],
        )?;
        Ok(())
    }

    fn delete(&self, kind: ResourceKind, id: &str) -> EngineResult<bool> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM installed_resources WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id],
        )?;
        Ok(removed > 0)
    }

    fn record_fingerprint(
        &self,
        kind: ResourceKind,
        id: &str,
        file_hash: &str,
        updated_at: Option<i64>,
    ) -> EngineResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE installed_resources
             SET file_hash = ?3, last_updated_at = COALESCE(?4, last_updated_at)
             WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id, file_hash, updated_at],
        )?;
        if changed == 0 {
            return Err(EngineError::Other(format!("{} {} is not installed", kind, id)));
        }
        debug!("[store] {} {} fingerprint → {}", kind, id, file_hash);
        Ok(())
    }

    fn set_branch(&self, kind: ResourceKind, id: &str, branch: &str) -> EngineResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE installed_resources SET repo_branch = ?3 WHERE kind = ?1 AND id = ?2",
            params![kind.as_str(), id, branch],
        )?;
        if changed == 0 {
            return Err(EngineError::Other(format!("{} {} is not installed", kind, id)));
        }
        Ok(())
    }
}
