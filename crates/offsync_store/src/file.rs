//! File-based state backend for persistent storage.

use crate::backend::StateBackend;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the advisory lock file.
const LOCK_FILE: &str = "LOCK";

/// A file-based state backend.
///
/// Each collection is stored as one file in the data directory. Writes go
/// to a temporary sibling which is then renamed over the target, so a
/// crash mid-write leaves the previous contents intact.
///
/// # Locking
///
/// The backend holds an advisory exclusive lock on a `LOCK` file in the
/// data directory for as long as it is alive, so two engines cannot share
/// one data directory. The lock is released when the backend is dropped.
///
/// # Example
///
/// ```no_run
/// use offsync_store::{FileBackend, StateBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("offline_data")).unwrap();
/// backend.save("records", b"serialized records").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    _lock_file: File,
}

impl FileBackend {
    /// Opens a backend rooted at the given directory, creating it if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Locked`] if another process holds the
    /// directory lock, or an I/O error if the directory cannot be
    /// created.
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;

        let lock_path = dir.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked);
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the data directory path.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn collection_path(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{collection}.db"))
    }
}

impl StateBackend for FileBackend {
    fn load(&self, collection: &str) -> StoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.collection_path(collection)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, collection: &str, bytes: &[u8]) -> StoreResult<()> {
        let target = self.collection_path(collection);
        let tmp = self.dir.join(format!("{collection}.db.tmp"));

        {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &target)?;

        Ok(())
    }

    fn remove(&self, collection: &str) -> StoreResult<()> {
        match std::fs::remove_file(self.collection_path(collection)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&self) -> StoreResult<()> {
        // Each save syncs its file before the rename
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_save_and_load() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("records", b"persistent data").unwrap();
        assert_eq!(
            backend.load("records").unwrap(),
            Some(b"persistent data".to_vec())
        );
    }

    #[test]
    fn file_load_missing_collection() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.load("records").unwrap(), None);
    }

    #[test]
    fn file_save_replaces() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("queue", b"one").unwrap();
        backend.save("queue", b"two").unwrap();
        assert_eq!(backend.load("queue").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn file_persistence_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let backend = FileBackend::open(dir.path()).unwrap();
            backend.save("records", b"survives").unwrap();
        }

        let backend = FileBackend::open(dir.path()).unwrap();
        assert_eq!(backend.load("records").unwrap(), Some(b"survives".to_vec()));
    }

    #[test]
    fn file_remove_is_idempotent() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.save("records", b"data").unwrap();
        backend.remove("records").unwrap();
        assert_eq!(backend.load("records").unwrap(), None);
        backend.remove("records").unwrap();
    }

    #[test]
    fn lock_prevents_second_open() {
        let dir = tempdir().unwrap();
        let _first = FileBackend::open(dir.path()).unwrap();

        let second = FileBackend::open(dir.path());
        assert!(matches!(second, Err(StoreError::Locked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempdir().unwrap();

        {
            let _backend = FileBackend::open(dir.path()).unwrap();
        }

        assert!(FileBackend::open(dir.path()).is_ok());
    }
}
