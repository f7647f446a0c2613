use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::SystemTime,
};

use anyhow::Context;

use crate::foundation::error::{DerivaError, DerivaResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Metadata the engine needs about a file under the image root.
pub struct FileStat {
    /// Last content modification (mtime).
    pub modified: SystemTime,
    /// Last metadata change (ctime); equals `modified` where the platform has no ctime.
    pub changed: SystemTime,
    /// Size in bytes.
    pub len: u64,
    /// True for regular files; directories and devices are treated as misses.
    pub is_file: bool,
}

impl FileStat {
    /// Later of `modified` and `changed`.
    pub fn newest(&self) -> SystemTime {
        self.modified.max(self.changed)
    }
}

/// Filesystem capability. Paths are `/`-separated and relative to the image root.
pub trait FileSystem: Send + Sync {
    /// Metadata for `path`, or `None` when it does not exist or cannot be inspected.
    fn stat(&self, path: &str) -> Option<FileStat>;

    /// Entire contents of `path`.
    fn read(&self, path: &str) -> DerivaResult<Vec<u8>>;

    /// Replace `path` with `bytes`. Readers never observe a partially written file.
    fn write(&self, path: &str, bytes: &[u8]) -> DerivaResult<()>;

    /// Delete `path`; returns `false` when it was already gone.
    fn remove(&self, path: &str) -> DerivaResult<bool>;
}

#[derive(Debug)]
/// [`FileSystem`] over a directory on the local disk.
pub struct LocalFs {
    root: PathBuf,
    tmp_seq: AtomicU64,
}

impl LocalFs {
    /// Serve files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_seq: AtomicU64::new(0),
        }
    }

    fn abs(&self, path: &str) -> PathBuf {
        self.root.join(Path::new(path))
    }
}

impl FileSystem for LocalFs {
    fn stat(&self, path: &str) -> Option<FileStat> {
        let meta = std::fs::metadata(self.abs(path)).ok()?;
        let modified = meta.modified().ok()?;
        Some(FileStat {
            modified,
            changed: changed_time(&meta).unwrap_or(modified),
            len: meta.len(),
            is_file: meta.is_file(),
        })
    }

    fn read(&self, path: &str) -> DerivaResult<Vec<u8>> {
        let abs = self.abs(path);
        std::fs::read(&abs)
            .with_context(|| format!("read '{}'", abs.display()))
            .map_err(DerivaError::from)
    }

    fn write(&self, path: &str, bytes: &[u8]) -> DerivaResult<()> {
        let abs = self.abs(path);
        let name = abs
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DerivaError::not_found(format!("'{path}' has no file name")))?;
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        let tmp = abs.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()));

        std::fs::write(&tmp, bytes).with_context(|| format!("write '{}'", tmp.display()))?;
        if let Err(err) = std::fs::rename(&tmp, &abs) {
            let _ = std::fs::remove_file(&tmp);
            return Err(anyhow::Error::new(err)
                .context(format!("rename into '{}'", abs.display()))
                .into());
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> DerivaResult<bool> {
        let abs = self.abs(path);
        match std::fs::remove_file(&abs) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("remove '{}'", abs.display()))
                .into()),
        }
    }
}

#[cfg(unix)]
fn changed_time(meta: &std::fs::Metadata) -> Option<SystemTime> {
    use std::os::unix::fs::MetadataExt;

    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u32::try_from(meta.ctime_nsec()).ok()?;
    SystemTime::UNIX_EPOCH.checked_add(std::time::Duration::new(secs, nanos))
}

#[cfg(not(unix))]
fn changed_time(_meta: &std::fs::Metadata) -> Option<SystemTime> {
    None
}

#[derive(Debug, Default)]
/// In-memory [`FileSystem`] with caller-controlled timestamps.
///
/// Writes are stamped with the current wall clock; [`MemoryFs::insert_at`] and
/// [`MemoryFs::touch`] place files at explicit instants.
pub struct MemoryFs {
    files: Mutex<HashMap<String, MemoryFile>>,
}

#[derive(Clone, Debug)]
struct MemoryFile {
    bytes: Vec<u8>,
    modified: SystemTime,
}

impl MemoryFs {
    /// Empty file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `path` with mtime/ctime `at`.
    pub fn insert_at(&self, path: &str, bytes: impl Into<Vec<u8>>, at: SystemTime) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(
                path.to_string(),
                MemoryFile {
                    bytes: bytes.into(),
                    modified: at,
                },
            );
        }
    }

    /// Move the timestamps of an existing file to `at`.
    pub fn touch(&self, path: &str, at: SystemTime) {
        if let Ok(mut files) = self.files.lock() {
            if let Some(file) = files.get_mut(path) {
                file.modified = at;
            }
        }
    }

    /// True if `path` exists.
    pub fn contains(&self, path: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(path))
            .unwrap_or(false)
    }

    fn lock(&self) -> DerivaResult<std::sync::MutexGuard<'_, HashMap<String, MemoryFile>>> {
        self.files
            .lock()
            .map_err(|_| DerivaError::Other(anyhow::anyhow!("memory fs lock poisoned")))
    }
}

impl FileSystem for MemoryFs {
    fn stat(&self, path: &str) -> Option<FileStat> {
        let files = self.files.lock().ok()?;
        let file = files.get(path)?;
        Some(FileStat {
            modified: file.modified,
            changed: file.modified,
            len: file.bytes.len() as u64,
            is_file: true,
        })
    }

    fn read(&self, path: &str) -> DerivaResult<Vec<u8>> {
        self.lock()?
            .get(path)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| DerivaError::not_found(format!("'{path}' does not exist")))
    }

    fn write(&self, path: &str, bytes: &[u8]) -> DerivaResult<()> {
        self.lock()?.insert(
            path.to_string(),
            MemoryFile {
                bytes: bytes.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn remove(&self, path: &str) -> DerivaResult<bool> {
        Ok(self.lock()?.remove(path).is_some())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/fs.rs"]
mod tests;
