use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const APP_DIR: &str = "monitor-sense";
pub const STORE_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a valid settings document: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("value for `{key}` has an unexpected shape: {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },

    #[error("value for `{key}` cannot be stored: {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
}

/// Store shared by everything that persists state. The lock is held across
/// the save, so a read-modify-save sequence is never interleaved.
pub type SharedStore = Arc<Mutex<JsonStore>>;

/// `<config dir>/monitor-sense/settings.json`
pub fn default_store_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(APP_DIR);
    path.push(STORE_FILE);
    path
}

/// A single JSON object on disk, edited key by key in memory and written
/// back only on [`JsonStore::save`].
#[derive(Debug, Default)]
pub struct JsonStore {
    path: Option<PathBuf>,
    entries: Map<String, Value>,
}

impl JsonStore {
    /// Store that never touches the disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Reads the document at `path`. A missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path).await {
            Ok(contents) => parse_document(&path, &contents)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file yet");
                Map::new()
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self {
            path: Some(path),
            entries,
        })
    }

    /// Like [`JsonStore::load`] but never fails. A corrupt document is moved
    /// aside to `<file>.corrupt` and replaced by an empty store. A file that
    /// exists but cannot be read is left untouched: the store runs in memory
    /// for this process and nothing is saved.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path).await {
            Ok(store) => store,
            Err(err @ StoreError::Corrupt { .. }) => {
                warn!(error = %err, "starting from an empty settings store");
                let backup = path.with_extension("json.corrupt");
                if let Err(e) = fs::rename(&path, &backup).await {
                    warn!(path = %backup.display(), error = %e, "could not keep corrupt settings file");
                }
                Self {
                    path: Some(path),
                    entries: Map::new(),
                }
            }
            Err(err) => {
                warn!(error = %err, "settings file unreadable, saving disabled for this run");
                Self::in_memory()
            }
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.entries.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Flushes the whole document. Written to a sibling temp file first so a
    /// crash mid-write leaves the previous version intact.
    pub async fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let write_err = |source| StoreError::Write {
            path: path.clone(),
            source,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| StoreError::Encode {
            key: "<document>".to_string(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).await.map_err(write_err)?;
        fs::rename(&tmp, path).await.map_err(write_err)?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }
}

fn parse_document(path: &Path, contents: &str) -> Result<Map<String, Value>, StoreError> {
    if contents.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: "top level is not an object".into(),
        }),
        Err(e) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fresh directory under the system temp dir, removed on drop.
    pub(crate) struct TempDir(pub PathBuf);

    impl TempDir {
        pub(crate) fn new() -> Self {
            static NEXT: AtomicUsize = AtomicUsize::new(0);
            let dir = std::env::temp_dir().join(format!(
                "monitor-sense-test-{}-{}",
                std::process::id(),
                NEXT.fetch_add(1, Ordering::Relaxed)
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        pub(crate) fn file(&self, name: &str) -> PathBuf {
            self.0.join(name)
        }
    }

    /// A disk-backed store whose saves fail: its directory is a regular file.
    pub(crate) async fn unwritable_store(dir: &TempDir) -> JsonStore {
        let store = JsonStore::load(dir.file("blocker/settings.json")).await.unwrap();
        std::fs::write(dir.file("blocker"), "file, not a directory").unwrap();
        store
    }

    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[tokio::test]
    async fn missing_file_loads_empty_and_save_creates_it() {
        let dir = TempDir::new();
        let path = dir.file("nested/settings.json");

        let mut store = JsonStore::load(&path).await.unwrap();
        assert_eq!(store.get::<u32>("version").unwrap(), None);

        store.set("version", &1u32).unwrap();
        store.save().await.unwrap();

        let reloaded = JsonStore::load(&path).await.unwrap();
        assert_eq!(reloaded.get::<u32>("version").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn nothing_reaches_disk_without_save() {
        let dir = TempDir::new();
        let path = dir.file("settings.json");

        let mut store = JsonStore::load(&path).await.unwrap();
        store.set("activeTab", "led").unwrap();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_moved_aside() {
        let dir = TempDir::new();
        let path = dir.file("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonStore::load(&path).await,
            Err(StoreError::Corrupt { .. })
        ));

        let store = JsonStore::open(&path).await;
        assert_eq!(store.get::<u32>("version").unwrap(), None);
        assert!(dir.file("settings.json.corrupt").exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unreadable_file_is_never_overwritten() {
        let dir = TempDir::new();
        let path = dir.file("settings.json");
        // a directory in its place fails the read without being corrupt
        std::fs::create_dir(&path).unwrap();

        let mut store = JsonStore::open(&path).await;
        assert_eq!(store.path(), None);

        store.set("version", &1u32).unwrap();
        store.save().await.unwrap();
        assert!(path.is_dir());
        assert!(!dir.file("settings.json.corrupt").exists());
    }

    #[test]
    fn decode_errors_name_the_key() {
        let mut store = JsonStore::in_memory();
        store.set("version", "one").unwrap();

        let err = store.get::<u32>("version").unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref key, .. } if key == "version"));
    }

    #[tokio::test]
    async fn unwritable_location_reports_write_error() {
        let dir = TempDir::new();
        let mut store = unwritable_store(&dir).await;
        store.set("version", &1u32).unwrap();

        assert!(matches!(store.save().await, Err(StoreError::Write { .. })));
    }
}
