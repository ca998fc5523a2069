//! WiFi marquee ESP32 firmware library.
//!
//! A scrolling text display and a servo, configured from a web page. The
//! device joins the stored network or, failing that, runs its own access
//! point with a captive portal so the page is the first thing a client sees.
//!
//! Everything except the [`wifi`] drivers and the ESP32 storage/peripheral
//! backends is platform-independent and tested on the host.
//!
//! # Layout
//!
//! - [`state`] - the shared context handed between the network context and the control loop
//! - [`ingest`] - validation of submitted configuration
//! - [`connectivity`] - the station / access point state machine
//! - [`portal`] - captive portal DNS
//! - [`control`] - the cooperative control loop
//! - [`web`] - configuration page server
//! - [`network`] - radio traits, link events and the host simulator
//! - [`storage`] - persisted settings
//! - [`peripherals`] - display, servo and reset button

pub mod config;
pub mod connectivity;
pub mod control;
pub mod ingest;
pub mod network;
pub mod peripherals;
pub mod portal;
pub mod state;
pub mod storage;
pub mod web;
#[cfg(feature = "esp32")]
pub mod wifi;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used items
pub use config::{DeviceConfig, WifiCredentials};
pub use connectivity::ConnectivityStateMachine;
pub use control::ControlLoop;
pub use ingest::{ConfigIngestHandler, IngestReport};
pub use portal::CaptivePortalResponder;
pub use state::{ConnectivityState, SharedConfigState};
pub use web::{ConfigApp, ConfigServer};
