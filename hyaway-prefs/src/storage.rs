//! Durable key/value backends for persisted preference stores
//!
//! Backends are synchronous and addressed by store name. Each store owns
//! exactly one key, so backends need no locking beyond their own map.

use hyaway_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Durable string storage shared by every store in one profile
pub trait StorageBackend: Send + Sync {
    /// Read the stored string for `key`, `None` if never written
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory backend
///
/// Clones share the same contents, so two stores opened on clones behave
/// like two tabs of one browser profile.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes across all clones
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make subsequent writes fail, as a full or disabled storage would
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Store a raw string directly, bypassing failure injection
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::PersistenceWrite {
                key: key.to_string(),
                reason: "storage quota exceeded".to_string(),
            });
        }
        self.insert_raw(key, value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per store under a root directory
///
/// Writes go to a temporary file which is then renamed over the target, so a
/// crash mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(Error::InvalidInput(format!("invalid storage key: {:?}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        std::fs::create_dir_all(&self.root)?;

        let temp_path = path.with_extension("json.tmp");
        std::fs::write(&temp_path, value)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&temp_path, &path)?;
        debug!("Wrote {} bytes to {}", value.len(), path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_clones_share_contents() {
        let a = MemoryStorage::new();
        let b = a.clone();

        a.write("prefs", "{}").unwrap();
        assert_eq!(b.read("prefs").unwrap().as_deref(), Some("{}"));
        assert_eq!(b.write_count(), 1);
    }

    #[test]
    fn test_memory_fail_writes() {
        let storage = MemoryStorage::new();
        storage.set_fail_writes(true);

        let err = storage.write("prefs", "{}").unwrap_err();
        assert!(matches!(err, Error::PersistenceWrite { .. }));
        assert_eq!(storage.read("prefs").unwrap(), None);
        assert_eq!(storage.write_count(), 0);

        storage.set_fail_writes(false);
        assert!(storage.write("prefs", "{}").is_ok());
    }

    #[test]
    fn test_file_read_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        assert_eq!(storage.read("hyaway-tags-settings").unwrap(), None);
    }

    #[test]
    fn test_file_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        storage.write("hyaway-tags-settings", "{\"a\":1}").unwrap();
        assert_eq!(
            storage.read("hyaway-tags-settings").unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        // No temp file left behind
        assert!(!dir.path().join("nested/hyaway-tags-settings.json.tmp").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());
        storage.write("prefs", "{}").unwrap();

        let mode = std::fs::metadata(dir.path().join("prefs.json"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_file_remove_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::new(dir.path());

        storage.write("prefs", "{}").unwrap();
        storage.remove("prefs").unwrap();
        storage.remove("prefs").unwrap();
        assert_eq!(storage.read("prefs").unwrap(), None);
    }

    #[test]
    fn test_file_rejects_path_like_keys() {
        let storage = FileStorage::new("/tmp");
        assert!(storage.path_for("../etc/passwd").is_err());
        assert!(storage.path_for("a/b").is_err());
        assert!(storage.path_for("").is_err());
        assert!(storage.path_for(".hidden").is_err());
    }
}
