//! NVS persistence for device settings.
//!
//! Settings are stored as strings in ESP32's Non-Volatile Storage under the
//! [`SETTINGS_NAMESPACE`] namespace so they persist across reboots.

use super::{KeyValueStore, StorageError, SETTINGS_KEYS, SETTINGS_NAMESPACE};
use crate::config::{MAX_PASSWORD_LEN, MAX_SSID_LEN};
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::info;

/// Read buffer: longest value plus NUL terminator.
const MAX_VALUE_BUFFER_SIZE: usize = {
    let longest = if MAX_SSID_LEN > MAX_PASSWORD_LEN {
        MAX_SSID_LEN
    } else {
        MAX_PASSWORD_LEN
    };
    longest + 1
};

/// NVS-backed settings namespace.
pub struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    /// Open (creating if needed) the settings namespace.
    ///
    /// The partition handle is the one also given to the WiFi driver;
    /// `EspDefaultNvsPartition::take()` may only be called once.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, StorageError> {
        let nvs = EspNvs::new(partition, SETTINGS_NAMESPACE, true)?;
        Ok(Self { nvs })
    }
}

impl KeyValueStore for NvsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut buf = [0u8; MAX_VALUE_BUFFER_SIZE];
        Ok(self.nvs.get_str(key, &mut buf)?.map(str::to_string))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.nvs.set_str(key, value)?;

        // Read back to catch flash write failures that return no error code
        let mut verify = [0u8; MAX_VALUE_BUFFER_SIZE];
        match self.nvs.get_str(key, &mut verify)? {
            Some(stored) if stored == value => Ok(()),
            _ => Err(StorageError::VerifyFailed {
                key: key.to_string(),
            }),
        }
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        for key in SETTINGS_KEYS {
            self.nvs.remove(key)?;
        }
        info!("NVS namespace {} cleared", SETTINGS_NAMESPACE);
        Ok(())
    }
}
