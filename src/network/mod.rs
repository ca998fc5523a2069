//! Radio abstraction layer.
//!
//! The connectivity state machine talks to the wireless radio through the
//! [`Radio`] trait and to the name-advertisement service through
//! [`Discovery`]. Implementations:
//! - **ESP32** (`esp32` feature): [`crate::wifi::EspRadio`], [`crate::wifi::MdnsDiscovery`]
//! - **Host**: [`SimulatedRadio`], [`LogDiscovery`]
//!
//! Radios report link changes asynchronously through a [`LinkEventSender`].

mod events;
mod host;

pub use events::{
    link_event_channel, LinkEvent, LinkEventReceiver, LinkEventSender, LINK_EVENT_CAPACITY,
};
pub use host::{detect_local_ip, LogDiscovery, RadioMode, SimulatedRadio};

use crate::config::{AccessPointSettings, WifiCredentials};
use std::fmt;

/// Wireless radio driver.
///
/// Every call returns promptly; the outcome of a station connect arrives
/// later as [`LinkEvent`]s.
pub trait Radio {
    /// Leave whatever mode the radio is in.
    fn disconnect(&mut self) -> Result<(), RadioError>;

    /// Begin joining a network in station mode.
    fn connect_station(&mut self, credentials: &WifiCredentials) -> Result<(), RadioError>;

    /// Bring up the fallback access point at its fixed address.
    fn start_access_point(&mut self, settings: &AccessPointSettings) -> Result<(), RadioError>;
}

/// Best-effort name advertisement on the station network.
pub trait Discovery {
    fn start(&mut self, hostname: &str, http_port: u16) -> Result<(), RadioError>;
    fn stop(&mut self);
}

/// Radio and discovery errors.
#[derive(Debug)]
pub enum RadioError {
    /// SSID could not be handed to the driver.
    InvalidSsid,
    /// Passphrase could not be handed to the driver.
    InvalidPassword,
    /// Generic I/O error.
    Io(std::io::Error),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "invalid SSID"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for RadioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RadioError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for RadioError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
