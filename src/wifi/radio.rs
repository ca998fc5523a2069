//! ESP-IDF WiFi driver behind the [`Radio`] trait.
//!
//! The driver is used in its non-blocking form: `connect_station` only starts
//! the association. Outcomes come back through system event loop
//! subscriptions that translate `WIFI_EVENT`/`IP_EVENT` into [`LinkEvent`]s.

use crate::config::{AccessPointSettings, WifiCredentials};
use crate::network::{LinkEvent, LinkEventSender, Radio, RadioError};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::ipv4::{self, Mask, RouterConfiguration, Subnet};
use esp_idf_svc::netif::{EspNetif, IpEvent, NetifConfiguration};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi, WifiEvent,
};
use log::{debug, info};
use std::net::Ipv4Addr;

/// Stations allowed on the fallback access point.
const AP_MAX_CONNECTIONS: u16 = 4;

/// Fallback access point channel.
const AP_CHANNEL: u8 = 1;

/// Station/AP radio on the ESP32 modem.
pub struct EspRadio {
    wifi: EspWifi<'static>,
    /// Address the AP netif was last configured with.
    ap_address: Option<(Ipv4Addr, u8)>,
    _wifi_events: EspSubscription<'static, System>,
    _ip_events: EspSubscription<'static, System>,
}

impl EspRadio {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
        events: LinkEventSender,
    ) -> Result<Self, RadioError> {
        let wifi = EspWifi::new(modem, sysloop.clone(), nvs)?;

        let link = events.clone();
        let wifi_events = sysloop.subscribe::<WifiEvent, _>(move |event| match event {
            WifiEvent::StaConnected(_) => link.notify(LinkEvent::Associated),
            // Also reported when an attempt fails to associate or authenticate
            WifiEvent::StaDisconnected(_) => link.notify(LinkEvent::LinkLost),
            _ => {}
        })?;

        let ip_events = sysloop.subscribe::<IpEvent, _>(move |event| {
            // Only the station netif runs a DHCP client
            if let IpEvent::DhcpIpAssigned(assignment) = event {
                events.notify(LinkEvent::AddressAcquired(assignment.ip()));
            }
        })?;

        Ok(Self {
            wifi,
            ap_address: None,
            _wifi_events: wifi_events,
            _ip_events: ip_events,
        })
    }

    /// Give the AP netif a fixed address with DHCP for clients and itself as
    /// their DNS server. The driver must be stopped.
    fn configure_ap_netif(&mut self, settings: &AccessPointSettings) -> Result<(), RadioError> {
        let wanted = (settings.address, settings.prefix_len);
        if self.ap_address == Some(wanted) {
            return Ok(());
        }

        let mut conf = NetifConfiguration::wifi_default_router();
        conf.ip_configuration = Some(ipv4::Configuration::Router(RouterConfiguration {
            subnet: Subnet {
                gateway: settings.address,
                mask: Mask(settings.prefix_len),
            },
            dhcp_enabled: true,
            dns: Some(settings.address),
            secondary_dns: None,
        }));
        let netif = EspNetif::new_with_conf(&conf)?;
        self.wifi.swap_netif_ap(netif)?;
        self.ap_address = Some(wanted);
        debug!("AP netif at {}/{}", settings.address, settings.prefix_len);
        Ok(())
    }
}

impl Radio for EspRadio {
    fn disconnect(&mut self) -> Result<(), RadioError> {
        if !self.wifi.is_started()? {
            return Ok(());
        }
        // Fails harmlessly when not associated or in AP mode
        let _ = self.wifi.disconnect();
        self.wifi.stop()?;
        debug!("WiFi stopped");
        Ok(())
    }

    fn connect_station(&mut self, credentials: &WifiCredentials) -> Result<(), RadioError> {
        let auth_method = if credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: credentials
                    .ssid()
                    .try_into()
                    .map_err(|_| RadioError::InvalidSsid)?,
                password: credentials
                    .password()
                    .try_into()
                    .map_err(|_| RadioError::InvalidPassword)?,
                auth_method,
                ..Default::default()
            }))?;
        self.wifi.start()?;
        self.wifi.connect()?;
        info!("Station connect to '{}' started", credentials.ssid());
        Ok(())
    }

    fn start_access_point(&mut self, settings: &AccessPointSettings) -> Result<(), RadioError> {
        self.configure_ap_netif(settings)?;

        let auth_method = if settings.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        self.wifi
            .set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                ssid: settings
                    .ssid
                    .as_str()
                    .try_into()
                    .map_err(|_| RadioError::InvalidSsid)?,
                password: settings
                    .password
                    .as_str()
                    .try_into()
                    .map_err(|_| RadioError::InvalidPassword)?,
                auth_method,
                channel: AP_CHANNEL,
                max_connections: AP_MAX_CONNECTIONS,
                ..Default::default()
            }))?;
        self.wifi.start()?;
        info!("Access point '{}' started", settings.ssid);
        Ok(())
    }
}
