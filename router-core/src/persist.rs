//! On-disk primitives shared by the cache, the ledger and the call log:
//! an advisory file lock and an atomic replace-write.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tempfile::NamedTempFile;

use crate::error::{Result, RouterError};

/// RAII guard for an exclusive advisory lock on `<target>.lock`.
///
/// The lock is released when the guard is dropped, on every exit path.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Block until the exclusive lock guarding `target` is held.
    ///
    /// The lock file sits next to `target` with a `.lock` suffix; its parent
    /// directory is created if missing.
    pub fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path_for(target);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;
        file.lock_exclusive().map_err(|e| {
            RouterError::Lock(format!("failed to lock '{}': {e}", path.display()))
        })?;
        tracing::trace!(lock = %path.display(), "acquired file lock");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// `<target>.lock`, e.g. `usage.json` → `usage.json.lock`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// Replace `path` with `bytes` so readers see either the old or the new
/// content, never a partial file.
///
/// Writes a temporary file in the same directory, syncs it, then renames
/// it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| RouterError::Io(e.error))?;
    Ok(())
}
