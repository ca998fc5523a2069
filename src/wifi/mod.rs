//! ESP32 WiFi and mDNS drivers.
//!
//! # Components
//!
//! - [`EspRadio`] - station/AP driver reporting through link events
//! - [`MdnsDiscovery`] - `marquee.local` advertisement

mod mdns;
mod radio;

pub use mdns::MdnsDiscovery;
pub use radio::EspRadio;
