//! mDNS advertisement in station mode.

use crate::network::{Discovery, RadioError};
use esp_idf_svc::mdns::EspMdns;
use log::info;

/// Advertises `<hostname>.local` and an `_http._tcp` service.
#[derive(Default)]
pub struct MdnsDiscovery {
    mdns: Option<EspMdns>,
}

impl MdnsDiscovery {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Discovery for MdnsDiscovery {
    fn start(&mut self, hostname: &str, http_port: u16) -> Result<(), RadioError> {
        // Restart cleanly if still running
        self.mdns = None;

        let mut mdns = EspMdns::take()?;
        mdns.set_hostname(hostname)?;
        mdns.set_instance_name(hostname)?;
        mdns.add_service(None, "_http", "_tcp", http_port, &[])?;
        self.mdns = Some(mdns);
        info!("mDNS: http://{}.local:{}/", hostname, http_port);
        Ok(())
    }

    fn stop(&mut self) {
        if self.mdns.take().is_some() {
            info!("mDNS stopped");
        }
    }
}
