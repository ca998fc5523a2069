//! Settings persistence for host (development) builds.
//!
//! The namespace is kept as a flat JSON object in a single file, by default
//! `~/.wifi-marquee/app.settings.json`. Every write is read back and compared.

use super::{KeyValueStore, StorageError, SETTINGS_NAMESPACE};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Default settings file path.
///
/// `MARQUEE_SETTINGS_PATH` wins; otherwise `~/.wifi-marquee/app.settings.json`.
pub fn default_settings_path() -> io::Result<PathBuf> {
    if let Ok(path) = std::env::var("MARQUEE_SETTINGS_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = std::env::var("HOME")
        .map_err(|_| io::Error::new(io::ErrorKind::NotFound, "HOME not set"))?;
    Ok(PathBuf::from(home)
        .join(".wifi-marquee")
        .join(format!("{}.json", SETTINGS_NAMESPACE)))
}

/// JSON-file backed settings namespace.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store at `path`, loading whatever is already there.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| StorageError::Corrupt(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No settings file at {:?}", path);
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    /// Open the store at [`default_settings_path`].
    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(default_settings_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.values)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        fs::write(&self.path, &json)?;

        // Read back to catch silent write failures
        let read_back = fs::read_to_string(&self.path)?;
        if read_back != json {
            return Err(StorageError::VerifyFailed {
                key: self.path.display().to_string(),
            });
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.values.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed settings file {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WifiCredentials;
    use crate::storage::{load_credentials, save_credentials, KEY_SSID};
    use std::env;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Counter to ensure unique test files even in parallel execution
    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn unique_settings_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let pid = std::process::id();
        env::temp_dir().join(format!("wifi-marquee-test-{}-{}.json", pid, id))
    }

    #[test]
    fn test_credentials_survive_reopen() {
        let path = unique_settings_path();
        let creds = WifiCredentials::new("Home", "secret123").unwrap();

        {
            let mut store = FileStore::open(&path).unwrap();
            save_credentials(&mut store, &creds).unwrap();
        }

        let store = FileStore::open(&path).unwrap();
        assert_eq!(load_credentials(&store), Some(creds));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let path = unique_settings_path();
        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get(KEY_SSID).unwrap(), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_removes_file() {
        let path = unique_settings_path();
        let mut store = FileStore::open(&path).unwrap();
        store.set(KEY_SSID, "x").unwrap();
        assert!(path.exists());

        store.clear().unwrap();
        assert!(!path.exists());
        assert_eq!(store.get(KEY_SSID).unwrap(), None);
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file() {
        let path = unique_settings_path();
        fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(StorageError::Corrupt(_))));
        let _ = fs::remove_file(&path);
    }
}
