//! Persistent settings.
//!
//! Settings live in a single key-value namespace, [`SETTINGS_NAMESPACE`],
//! holding the station credentials under [`KEY_SSID`] and [`KEY_PASSWORD`].
//!
//! # Backends
//!
//! - [`MemoryStore`] - in-memory, for tests
//! - [`FileStore`] - JSON file, host builds
//! - [`NvsStore`] - ESP32 NVS (`esp32` feature)

mod file;
#[cfg(feature = "esp32")]
mod nvs;

pub use file::{default_settings_path, FileStore};
#[cfg(feature = "esp32")]
pub use nvs::NvsStore;

use crate::config::WifiCredentials;
use log::{info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Namespace holding the device settings.
pub const SETTINGS_NAMESPACE: &str = "app.settings";

/// Station SSID key.
pub const KEY_SSID: &str = "ssid";

/// Station passphrase key.
pub const KEY_PASSWORD: &str = "password";

/// Every key written to the namespace.
pub const SETTINGS_KEYS: [&str; 2] = [KEY_SSID, KEY_PASSWORD];

/// A key-value namespace in non-volatile storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Remove every key in the namespace.
    fn clear(&mut self) -> Result<(), StorageError>;
}

/// Store handle shared by the HTTP handler and the control loop.
pub type SharedStore = Arc<Mutex<dyn KeyValueStore + Send>>;

/// Wrap a store for sharing across contexts.
pub fn shared<S: KeyValueStore + Send + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Load station credentials.
///
/// Returns `None` when nothing is stored, when reading fails, or when the
/// stored values no longer pass validation. Problems are logged.
pub fn load_credentials(store: &dyn KeyValueStore) -> Option<WifiCredentials> {
    let ssid = match store.get(KEY_SSID) {
        Ok(Some(ssid)) => ssid,
        Ok(None) => {
            log::debug!("No credentials stored in {}", SETTINGS_NAMESPACE);
            return None;
        }
        Err(e) => {
            warn!("Failed to read {}: {}", KEY_SSID, e);
            return None;
        }
    };
    let password = match store.get(KEY_PASSWORD) {
        Ok(password) => password.unwrap_or_default(),
        Err(e) => {
            warn!("Failed to read {}: {}", KEY_PASSWORD, e);
            return None;
        }
    };

    match WifiCredentials::new(ssid, password) {
        Ok(creds) => Some(creds),
        Err(e) => {
            log::error!("Stored credentials are invalid: {}", e);
            None
        }
    }
}

/// Persist station credentials.
///
/// Both keys are written or neither survives: when either write fails the
/// namespace is cleared, so a later boot never pairs one network's SSID
/// with another's password.
pub fn save_credentials(
    store: &mut dyn KeyValueStore,
    creds: &WifiCredentials,
) -> Result<(), StorageError> {
    let written = store
        .set(KEY_SSID, creds.ssid())
        .and_then(|()| store.set(KEY_PASSWORD, creds.password()));
    if let Err(e) = written {
        if let Err(clear_err) = store.clear() {
            log::error!("Failed to clear partial credentials: {}", clear_err);
        }
        return Err(e);
    }
    info!("Credentials for '{}' saved", creds.ssid());
    Ok(())
}

/// Wipe the settings namespace.
pub fn clear_settings(store: &mut dyn KeyValueStore) -> Result<(), StorageError> {
    store.clear()?;
    warn!("Settings namespace {} cleared", SETTINGS_NAMESPACE);
    Ok(())
}

/// In-memory store.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.values.clear();
        Ok(())
    }
}

/// Storage errors.
#[derive(Debug)]
pub enum StorageError {
    /// File or flash I/O failed.
    Io(std::io::Error),
    /// Stored data could not be decoded.
    Corrupt(String),
    /// Written data did not read back identically.
    VerifyFailed { key: String },
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Corrupt(msg) => write!(f, "corrupt settings: {}", msg),
            Self::VerifyFailed { key } => write!(f, "verification failed for '{}'", key),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for StorageError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Store whose writes always fail.
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Corrupt("unreadable".into()))
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "flash worn out",
            )))
        }
        fn clear(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    /// Memory store that refuses writes to one key.
    struct FailingKey {
        inner: MemoryStore,
        key: &'static str,
    }

    impl FailingKey {
        fn seeded(key: &'static str) -> Self {
            let mut inner = MemoryStore::new();
            save_credentials(&mut inner, &WifiCredentials::new("Old", "oldpass1").unwrap())
                .unwrap();
            Self { inner, key }
        }
    }

    impl KeyValueStore for FailingKey {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }
        fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
            if key == self.key {
                return Err(StorageError::VerifyFailed { key: key.into() });
            }
            self.inner.set(key, value)
        }
        fn clear(&mut self) -> Result<(), StorageError> {
            self.inner.clear()
        }
    }

    #[test]
    fn test_save_load_credentials() {
        let mut store = MemoryStore::new();
        let creds = WifiCredentials::new("Home", "secret123").unwrap();
        save_credentials(&mut store, &creds).unwrap();

        assert_eq!(store.get(KEY_SSID).unwrap().as_deref(), Some("Home"));
        assert_eq!(load_credentials(&store), Some(creds));
    }

    #[test]
    fn test_load_empty_store() {
        assert_eq!(load_credentials(&MemoryStore::new()), None);
    }

    #[test]
    fn test_load_without_password_is_open_network() {
        let mut store = MemoryStore::new();
        store.set(KEY_SSID, "Cafe").unwrap();
        let creds = load_credentials(&store).unwrap();
        assert!(creds.is_open());
    }

    #[test]
    fn test_load_rejects_oversized_values() {
        let mut store = MemoryStore::new();
        store.set(KEY_SSID, &"s".repeat(40)).unwrap();
        assert_eq!(load_credentials(&store), None);
    }

    #[test]
    fn test_clear_settings() {
        let mut store = MemoryStore::new();
        save_credentials(&mut store, &WifiCredentials::new("a", "b").unwrap()).unwrap();
        clear_settings(&mut store).unwrap();
        assert!(store.is_empty());
        assert_eq!(load_credentials(&store), None);
    }

    #[test]
    fn test_read_error_yields_none() {
        assert_eq!(load_credentials(&BrokenStore), None);
    }

    #[test]
    fn test_write_error_propagates() {
        let creds = WifiCredentials::new("a", "b").unwrap();
        let err = save_credentials(&mut BrokenStore, &creds).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(err.to_string().contains("flash worn out"));
    }

    #[test]
    fn test_failed_password_write_leaves_no_mixed_pair() {
        let mut store = FailingKey::seeded(KEY_PASSWORD);
        let creds = WifiCredentials::new("New", "newpass1").unwrap();
        let err = save_credentials(&mut store, &creds).unwrap_err();
        assert!(matches!(err, StorageError::VerifyFailed { ref key } if key == KEY_PASSWORD));
        assert_eq!(load_credentials(&store), None);
        assert!(store.inner.is_empty());
    }

    #[test]
    fn test_failed_ssid_write_leaves_no_mixed_pair() {
        let mut store = FailingKey::seeded(KEY_SSID);
        let creds = WifiCredentials::new("New", "newpass1").unwrap();
        assert!(save_credentials(&mut store, &creds).is_err());
        assert_eq!(load_credentials(&store), None);
    }

    #[test]
    fn test_shared_store_coerces() {
        let store = shared(MemoryStore::new());
        store.lock().unwrap().set(KEY_SSID, "x").unwrap();
        assert_eq!(store.lock().unwrap().get(KEY_SSID).unwrap().as_deref(), Some("x"));
    }
}
