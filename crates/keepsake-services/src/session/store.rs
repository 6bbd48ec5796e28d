//! Key-value persistence for the session slots.

use keepsake_core::AppError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session store is corrupt: {0}")]
    Corrupt(String),

    #[error("Session decode failed: {0}")]
    Decode(String),

    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::Internal(err.to_string())
    }
}

/// String slots. Implementations must tolerate missing slots.
pub trait SessionStore: Send + Sync {
    fn get(&self, slot: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, slot: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&self, slot: &str) -> Result<(), SessionError>;
}

/// Slots kept as a JSON object in a single file.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<HashMap<String, String>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| SessionError::Corrupt(e.to_string()))
    }

    /// A corrupt file is replaced rather than blocking writes.
    fn read_map_for_write(&self) -> Result<HashMap<String, String>, SessionError> {
        match self.read_map() {
            Err(SessionError::Corrupt(reason)) => {
                tracing::warn!(path = %self.path.display(), reason = %reason, "Discarding corrupt session file");
                Ok(HashMap::new())
            }
            other => other,
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<(), SessionError> {
        if map.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(map)
            .map_err(|e| SessionError::Corrupt(e.to_string()))?;
        write_private(&self.path, body.as_bytes())?;
        Ok(())
    }
}

/// Write `data`, leaving the file readable by the owner only.
#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, data)
}

impl SessionStore for FileSessionStore {
    fn get(&self, slot: &str) -> Result<Option<String>, SessionError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_map()?.remove(slot))
    }

    fn set(&self, slot: &str, value: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map_for_write()?;
        map.insert(slot.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, slot: &str) -> Result<(), SessionError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut map = self.read_map_for_write()?;
        if map.remove(slot).is_none() && self.path.exists() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

#[derive(Debug, Default)]
struct MemorySlots {
    values: HashMap<String, String>,
    failing_writes: usize,
}

/// In-process slots. Cloning shares the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Mutex<MemorySlots>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, MemorySlots> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, slot: &str) -> bool {
        self.slots().values.contains_key(slot)
    }

    pub fn is_empty(&self) -> bool {
        self.slots().values.is_empty()
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl MemorySessionStore {
    /// Make the next `count` calls to `set` fail.
    pub fn fail_next_writes(&self, count: usize) {
        self.slots().failing_writes = count;
    }

    /// Value of a slot, bypassing any injected failure.
    pub fn raw(&self, slot: &str) -> Option<String> {
        self.slots().values.get(slot).cloned()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, slot: &str) -> Result<Option<String>, SessionError> {
        Ok(self.slots().values.get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &str) -> Result<(), SessionError> {
        let mut slots = self.slots();
        if slots.failing_writes > 0 {
            slots.failing_writes -= 1;
            return Err(SessionError::Unavailable("quota exceeded".to_string()));
        }
        slots.values.insert(slot.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, slot: &str) -> Result<(), SessionError> {
        self.slots().values.remove(slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));

        store.remove("b").unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_file_fails_reads_but_not_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileSessionStore::new(&path);

        assert!(matches!(store.get("a"), Err(SessionError::Corrupt(_))));
        store.remove("a").unwrap();
        store.set("a", "1").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("1"));
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{}").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = FileSessionStore::new(&path);
        store.set("a", "1").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        let fresh = FileSessionStore::new(dir.path().join("new.json"));
        fresh.set("a", "1").unwrap();
        let mode = std::fs::metadata(fresh.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn memory_store_injected_failures() {
        let store = MemorySessionStore::new();
        store.fail_next_writes(1);
        assert!(store.set("a", "1").is_err());
        store.set("a", "1").unwrap();
        assert_eq!(store.raw("a").as_deref(), Some("1"));
    }
}
