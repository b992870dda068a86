// AgentDeck Engine — App Sync
// Propagates a resource from the SSOT to each enabled client application.
// A failing app never blocks the others; the executor collects failures.
//
//   hooks — merge of hook definitions into each app's settings.json

use log::{info, warn};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use crate::atoms::error::ApplyError;
use crate::atoms::types::{AppType, ResourceKind, ResourcePayload};
use crate::engine::paths::app_config_root;
use crate::engine::ssot::{resource_relative_path, write_resource};

mod hooks;

use hooks::{hook_entries, merge_into_settings, SETTINGS_FILE};

/// Destination for resource content, one application at a time.
pub trait ConfigSink: Send + Sync {
    fn apply(
        &self,
        kind: ResourceKind,
        id: &str,
        app: AppType,
        payload: &ResourcePayload,
    ) -> Result<(), ApplyError>;
}

/// Writes resources into each app's config directory
/// (`<root>/<kind dir>/<id>[.<ext>]`). Hooks are also merged into
/// `<root>/settings.json`, which is what the CLIs actually read; the copy
/// under `hooks/` records what was merged so the next update can replace it.
#[derive(Debug, Clone, Default)]
pub struct DirectorySink {
    roots: HashMap<AppType, PathBuf>,
}

impl DirectorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every app whose config root already exists under `$HOME`.
    pub fn from_home() -> Self {
        let mut sink = Self::new();
        for app in AppType::ALL {
            let root = app_config_root(app);
            if root.is_dir() {
                sink.roots.insert(app, root);
            }
        }
        sink
    }

    pub fn with_root(mut self, app: AppType, root: impl Into<PathBuf>) -> Self {
        self.roots.insert(app, root.into());
        self
    }
}

impl ConfigSink for DirectorySink {
    fn apply(
        &self,
        kind: ResourceKind,
        id: &str,
        app: AppType,
        payload: &ResourcePayload,
    ) -> Result<(), ApplyError> {
        let Some(root) = self.roots.get(&app) else {
            warn!("[sync] {} not configured, skipping {} {}", app, kind, id);
            return Err(ApplyError::AppUnavailable { app: app.to_string() });
        };
        let write_err = |source: io::Error| ApplyError::Write { app: app.to_string(), source };

        let target = root
            .join(kind.dir_name())
            .join(resource_relative_path(kind, id).map_err(write_err)?);
        if kind == ResourceKind::Hook {
            apply_hook(root, &target, id, payload).map_err(|e| match e {
                HookApplyError::Invalid(reason) => ApplyError::InvalidHook { id: id.to_string(), reason },
                HookApplyError::Io(source) => write_err(source),
            })?;
        }
        write_resource(&target, kind, &payload.files).map_err(write_err)?;
        info!("[sync] {} {} -> {}", kind, id, app);
        Ok(())
    }
}

enum HookApplyError {
    Invalid(String),
    Io(io::Error),
}

/// Swap the entries merged from the previous copy at `copy` for the ones
/// in `payload`.
fn apply_hook(
    root: &Path,
    copy: &Path,
    id: &str,
    payload: &ResourcePayload,
) -> Result<(), HookApplyError> {
    let [file] = payload.files.as_slice() else {
        return Err(HookApplyError::Invalid(format!(
            "expected one definition file, got {}",
            payload.files.len()
        )));
    };
    let next = hook_entries(&file.content).map_err(HookApplyError::Invalid)?;
    let previous = match std::fs::read(copy) {
        Ok(bytes) => hook_entries(&bytes).unwrap_or_else(|e| {
            warn!("[sync] Previous copy of hook {} is unreadable ({}), merging fresh", id, e);
            Vec::new()
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(HookApplyError::Io(e)),
    };
    merge_into_settings(&root.join(SETTINGS_FILE), &previous, &next).map_err(HookApplyError::Io)
}
