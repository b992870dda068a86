// AgentDeck Engine — SSOT Store
// The single-source-of-truth copy of every installed resource. App config
// directories are derived from it. Writes are staged next to the target and
// swapped into place so a failed write never leaves partial content.

use log::{info, warn};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::atoms::types::{RemoteFile, ResourceKind};

pub struct SsotStore {
    root: PathBuf,
}

impl SsotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SsotStore { root: root.into() }
    }

    /// SSOT under the platform data dir.
    pub fn open_default() -> Self {
        Self::new(crate::engine::paths::ssot_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, kind: ResourceKind, id: &str) -> io::Result<PathBuf> {
        Ok(self.root.join(kind.dir_name()).join(resource_relative_path(kind, id)?))
    }

    pub fn exists(&self, kind: ResourceKind, id: &str) -> bool {
        self.path(kind, id).map(|p| p.exists()).unwrap_or(false)
    }

    /// Current content. Bundle files come back sorted by relative path.
    pub fn read(&self, kind: ResourceKind, id: &str) -> io::Result<Vec<RemoteFile>> {
        let target = self.path(kind, id)?;
        if kind.is_bundle() {
            let mut files = Vec::new();
            collect_files(&target, &target, &mut files)?;
            files.sort_by(|a, b| a.path.cmp(&b.path));
            Ok(files)
        } else {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(vec![RemoteFile { path: name, content: std::fs::read(&target)? }])
        }
    }

    /// Replace the resource's content in one step.
    pub fn write(&self, kind: ResourceKind, id: &str, files: &[RemoteFile]) -> io::Result<()> {
        let target = self.path(kind, id)?;
        write_resource(&target, kind, files)?;
        info!("[ssot] Wrote {} {} ({} file(s))", kind, id, files.len());
        Ok(())
    }
}

/// `<id>` for bundles, `<id>.<ext>` for single files. Ids may carry a
/// namespace segment but never escape the kind directory.
pub(crate) fn resource_relative_path(kind: ResourceKind, id: &str) -> io::Result<PathBuf> {
    check_relative(id)?;
    if kind.is_bundle() {
        Ok(PathBuf::from(id))
    } else {
        Ok(PathBuf::from(format!("{}.{}", id, kind.file_extension())))
    }
}

fn check_relative(path: &str) -> io::Result<()> {
    let p = Path::new(path);
    let ok = !path.is_empty()
        && p.components().all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(io::Error::new(io::ErrorKind::InvalidInput, format!("unsafe resource path: {}", path)))
    }
}

/// Staged write of one resource to `target`. Single files go through a
/// temp file + rename; bundles are built in a staging directory which then
/// replaces the old directory.
pub(crate) fn write_resource(target: &Path, kind: ResourceKind, files: &[RemoteFile]) -> io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no parent"))?;
    std::fs::create_dir_all(parent)?;
    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix: u32 = rand::random();

    if !kind.is_bundle() {
        let [file] = files else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected exactly one file, got {}", files.len()),
            ));
        };
        let staged = parent.join(format!(".{}.tmp-{:08x}", file_name, suffix));
        if let Err(e) = std::fs::write(&staged, &file.content) {
            let _ = std::fs::remove_file(&staged);
            return Err(e);
        }
        return std::fs::rename(&staged, target).inspect_err(|_| {
            let _ = std::fs::remove_file(&staged);
        });
    }

    let staged = parent.join(format!(".{}.staging-{:08x}", file_name, suffix));
    if let Err(e) = stage_bundle(&staged, files) {
        let _ = std::fs::remove_dir_all(&staged);
        return Err(e);
    }

    let previous = parent.join(format!(".{}.old-{:08x}", file_name, suffix));
    let had_previous = target.exists();
    if had_previous {
        if let Err(e) = std::fs::rename(target, &previous) {
            let _ = std::fs::remove_dir_all(&staged);
            return Err(e);
        }
    }
    if let Err(e) = std::fs::rename(&staged, target) {
        if had_previous {
            let _ = std::fs::rename(&previous, target);
        }
        let _ = std::fs::remove_dir_all(&staged);
        return Err(e);
    }
    if had_previous {
        if let Err(e) = remove_any(&previous) {
            warn!("[ssot] Could not remove old copy {:?}: {}", previous, e);
        }
    }
    Ok(())
}

fn stage_bundle(staged: &Path, files: &[RemoteFile]) -> io::Result<()> {
    std::fs::create_dir_all(staged)?;
    for file in files {
        check_relative(&file.path)?;
        let dest = staged.join(&file.path);
        if let Some(dir) = dest.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&dest, &file.content)?;
    }
    Ok(())
}

fn remove_any(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    }
}

fn collect_files(base: &Path, dir: &Path, out: &mut Vec<RemoteFile>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(base, &path, out)?;
        } else {
            let relative = path
                .strip_prefix(base)
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.push(RemoteFile { path: relative, content: std::fs::read(&path)? });
        }
    }
    Ok(())
}
