//! Host radio simulator.
//!
//! On host systems there is no WiFi radio to drive. [`SimulatedRadio`] plays
//! its part: it "joins" only networks it was told are reachable, reports the
//! result through link events like the ESP-IDF driver does, and remembers
//! which mode it is in so the simulator console can show it.

use super::{Discovery, LinkEvent, LinkEventSender, Radio, RadioError};
use crate::config::{AccessPointSettings, WifiCredentials};
use log::{debug, info};
use std::net::{IpAddr, Ipv4Addr};

/// What the simulated radio is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioMode {
    Off,
    Station { ssid: String, linked: bool },
    AccessPoint { ssid: String, address: Ipv4Addr },
}

/// Simulated station/AP radio.
#[derive(Debug)]
pub struct SimulatedRadio {
    events: LinkEventSender,
    reachable: Vec<WifiCredentials>,
    station_ip: Ipv4Addr,
    mode: RadioMode,
    connect_calls: u32,
}

impl SimulatedRadio {
    /// Radio that can reach the given networks and gets `station_ip` from DHCP.
    pub fn new(events: LinkEventSender, reachable: Vec<WifiCredentials>, station_ip: Ipv4Addr) -> Self {
        Self {
            events,
            reachable,
            station_ip,
            mode: RadioMode::Off,
            connect_calls: 0,
        }
    }

    /// Parse `ssid:password,ssid2:password2` into reachable networks.
    ///
    /// Entries that fail credential validation are skipped.
    pub fn parse_networks(list: &str) -> Vec<WifiCredentials> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(|entry| {
                let (ssid, password) = entry.split_once(':').unwrap_or((entry, ""));
                WifiCredentials::new(ssid, password).ok()
            })
            .collect()
    }

    pub fn mode(&self) -> &RadioMode {
        &self.mode
    }

    /// Number of station connects started so far.
    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }
}

impl Radio for SimulatedRadio {
    fn disconnect(&mut self) -> Result<(), RadioError> {
        if let RadioMode::Station { linked: true, .. } = self.mode {
            // The real driver reports STA_DISCONNECTED for a deliberate
            // disconnect too.
            self.events.notify(LinkEvent::LinkLost);
        }
        if self.mode != RadioMode::Off {
            debug!("Simulated radio off");
        }
        self.mode = RadioMode::Off;
        Ok(())
    }

    fn connect_station(&mut self, credentials: &WifiCredentials) -> Result<(), RadioError> {
        self.connect_calls += 1;
        let linked = self.reachable.iter().any(|net| net == credentials);
        info!(
            "Simulated radio joining '{}' ({})",
            credentials.ssid(),
            if linked { "reachable" } else { "unreachable" }
        );
        self.mode = RadioMode::Station {
            ssid: credentials.ssid().to_string(),
            linked,
        };
        if linked {
            self.events.notify(LinkEvent::Associated);
            self.events.notify(LinkEvent::AddressAcquired(self.station_ip));
        } else {
            // Auth failure or no such network: the driver reports a disconnect
            self.events.notify(LinkEvent::LinkLost);
        }
        Ok(())
    }

    fn start_access_point(&mut self, settings: &AccessPointSettings) -> Result<(), RadioError> {
        info!(
            "Simulated access point '{}' up at {}/{}",
            settings.ssid, settings.address, settings.prefix_len
        );
        self.mode = RadioMode::AccessPoint {
            ssid: settings.ssid.clone(),
            address: settings.address,
        };
        Ok(())
    }
}

/// Discovery stand-in that only logs.
#[derive(Debug, Default)]
pub struct LogDiscovery {
    advertising: Option<String>,
}

impl LogDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hostname currently advertised, if any.
    pub fn advertising(&self) -> Option<&str> {
        self.advertising.as_deref()
    }
}

impl Discovery for LogDiscovery {
    fn start(&mut self, hostname: &str, http_port: u16) -> Result<(), RadioError> {
        info!("Discovery: would advertise http://{}.local:{}/", hostname, http_port);
        self.advertising = Some(hostname.to_string());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(hostname) = self.advertising.take() {
            info!("Discovery: stopped advertising {}.local", hostname);
        }
    }
}

/// Primary local IPv4 address of the host.
///
/// Creates a UDP socket and "connects" it to a public address (nothing is
/// sent), then reads back which local address the OS picked.
pub fn detect_local_ip() -> Option<Ipv4Addr> {
    use std::net::UdpSocket;

    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::link_event_channel;

    fn home() -> WifiCredentials {
        WifiCredentials::new("Home", "secret123").unwrap()
    }

    #[test]
    fn test_reachable_network_reports_address() {
        let (tx, rx) = link_event_channel();
        let ip = Ipv4Addr::new(10, 0, 0, 9);
        let mut radio = SimulatedRadio::new(tx, vec![home()], ip);

        radio.connect_station(&home()).unwrap();
        assert_eq!(rx.try_next(), Some(LinkEvent::Associated));
        assert_eq!(rx.try_next(), Some(LinkEvent::AddressAcquired(ip)));
        assert_eq!(
            radio.mode(),
            &RadioMode::Station {
                ssid: "Home".into(),
                linked: true
            }
        );
    }

    #[test]
    fn test_wrong_password_reports_link_lost() {
        let (tx, rx) = link_event_channel();
        let mut radio = SimulatedRadio::new(tx, vec![home()], Ipv4Addr::LOCALHOST);

        let wrong = WifiCredentials::new("Home", "nope").unwrap();
        radio.connect_station(&wrong).unwrap();
        assert_eq!(rx.try_next(), Some(LinkEvent::LinkLost));
        assert_eq!(rx.try_next(), None);
        assert_eq!(radio.connect_calls(), 1);
    }

    #[test]
    fn test_disconnect_of_linked_station_reports_loss() {
        let (tx, rx) = link_event_channel();
        let mut radio = SimulatedRadio::new(tx, vec![home()], Ipv4Addr::LOCALHOST);
        radio.connect_station(&home()).unwrap();
        rx.discard_pending();

        radio.disconnect().unwrap();
        assert_eq!(rx.try_next(), Some(LinkEvent::LinkLost));
        assert_eq!(radio.mode(), &RadioMode::Off);

        // Already off: nothing more to report
        radio.disconnect().unwrap();
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn test_access_point_mode() {
        let (tx, _rx) = link_event_channel();
        let mut radio = SimulatedRadio::new(tx, vec![], Ipv4Addr::LOCALHOST);
        let settings = AccessPointSettings::default();
        radio.start_access_point(&settings).unwrap();
        assert_eq!(
            radio.mode(),
            &RadioMode::AccessPoint {
                ssid: settings.ssid.clone(),
                address: settings.address
            }
        );
    }

    #[test]
    fn test_parse_networks() {
        let nets = SimulatedRadio::parse_networks("Home:secret123, Cafe ,,Lab:pw");
        assert_eq!(nets.len(), 3);
        assert_eq!(nets[0], home());
        assert!(nets[1].is_open());
        assert_eq!(nets[2].ssid(), "Lab");

        // Oversized SSID is skipped
        let long = format!("{}:x", "s".repeat(40));
        assert!(SimulatedRadio::parse_networks(&long).is_empty());
    }

    #[test]
    fn test_log_discovery() {
        let mut discovery = LogDiscovery::new();
        discovery.start("marquee", 80).unwrap();
        assert_eq!(discovery.advertising(), Some("marquee"));
        discovery.stop();
        assert_eq!(discovery.advertising(), None);
    }

    #[test]
    fn test_detect_local_ip() {
        // May be None in air-gapped environments; just make sure it doesn't panic
        if let Some(ip) = detect_local_ip() {
            assert!(!ip.is_unspecified());
        }
    }
}
