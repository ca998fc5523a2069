//! Connectivity state machine.
//!
//! ```text
//!                 boot / restart requested
//!   Disconnected ───────────────────────────► Connecting
//!                                              │   │
//!               address acquired ◄─────────────┘   │ budget exhausted
//!                      │                           │ or no credentials
//!                      ▼                           ▼
//!                  Connected                   APFallback
//!                      │
//!                      │ link lost (auto-reconnect armed)
//!                      └──────────────────────► Connecting
//! ```
//!
//! Everything here runs inside the control loop. Radio callbacks only enqueue
//! [`LinkEvent`]s; the machine drains them between loop steps and during its
//! own connect poll, so driver calls are never re-entered from a callback.

use crate::config::{NetworkSettings, WifiCredentials};
use crate::network::{Discovery, LinkEvent, LinkEventReceiver, Radio};
use crate::portal::CaptivePortalResponder;
use crate::state::{ConnectivityState, SharedConfigState};
use log::{debug, error, info, warn};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::thread;

/// Owns the radio, the discovery service and the captive portal.
pub struct ConnectivityStateMachine<R: Radio, D: Discovery> {
    radio: R,
    discovery: D,
    events: LinkEventReceiver,
    portal: CaptivePortalResponder,
    settings: NetworkSettings,
    shared: Arc<SharedConfigState>,
    state: ConnectivityState,
    station_ip: Option<Ipv4Addr>,
    /// Credentials used by [`reconnect`](Self::reconnect). Only replaced
    /// through [`reload_credentials`](Self::reload_credentials).
    credentials: WifiCredentials,
    /// Set when an armed link loss asked for a reconnect.
    reconnect_due: bool,
}

impl<R: Radio, D: Discovery> ConnectivityStateMachine<R, D> {
    pub fn new(
        radio: R,
        discovery: D,
        events: LinkEventReceiver,
        settings: NetworkSettings,
        shared: Arc<SharedConfigState>,
    ) -> Self {
        shared.publish_link(ConnectivityState::Disconnected, None);
        let credentials = shared.credentials();
        Self {
            radio,
            discovery,
            events,
            portal: CaptivePortalResponder::new(),
            settings,
            shared,
            state: ConnectivityState::Disconnected,
            station_ip: None,
            credentials,
            reconnect_due: false,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn station_ip(&self) -> Option<Ipv4Addr> {
        self.station_ip
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    pub fn portal(&self) -> &CaptivePortalResponder {
        &self.portal
    }

    pub fn settings(&self) -> &NetworkSettings {
        &self.settings
    }

    /// Take the credentials currently staged in the shared state for the
    /// next [`reconnect`](Self::reconnect).
    pub fn reload_credentials(&mut self) {
        self.credentials = self.shared.credentials();
        debug!("Loaded credentials for '{}'", self.credentials.ssid());
    }

    /// Tear down whatever is running and connect with the loaded credentials.
    ///
    /// Blocks for at most the connect policy's ceiling. Ends in `Connected`
    /// or `APFallback`.
    pub fn reconnect(&mut self) {
        self.teardown();
        self.set_state(ConnectivityState::Connecting);

        let credentials = self.credentials.clone();
        if !credentials.is_configured() {
            info!("No credentials configured, starting access point");
            self.enter_ap_fallback();
            return;
        }

        if self.connect_station(&credentials) {
            return;
        }

        warn!(
            "Could not join '{}' within {:?}, starting access point",
            credentials.ssid(),
            self.settings.connect.ceiling()
        );
        self.enter_ap_fallback();
    }

    /// Issue the connect and poll for an address. Returns true once connected.
    fn connect_station(&mut self, credentials: &WifiCredentials) -> bool {
        info!("Connecting to '{}'", credentials.ssid());
        if let Err(e) = self.radio.connect_station(credentials) {
            error!("Station connect failed: {}", e);
            return false;
        }

        let policy = self.settings.connect;
        for attempt in 1..=policy.attempts {
            self.drain_link_events();
            if self.state == ConnectivityState::Connected {
                return true;
            }
            debug!("Waiting for address ({}/{})", attempt, policy.attempts);
            thread::sleep(policy.interval);
        }
        self.drain_link_events();
        self.state == ConnectivityState::Connected
    }

    /// Release every resource of the current state.
    fn teardown(&mut self) {
        self.shared.flags.auto_reconnect_enabled.lower();
        self.shared.flags.handle_captive_dns.lower();
        self.reconnect_due = false;
        self.portal.stop();
        self.discovery.stop();
        if let Err(e) = self.radio.disconnect() {
            warn!("Radio disconnect failed: {}", e);
        }
        // Whatever the old mode reported, including the disconnect we just
        // caused, no longer applies.
        let stale = self.events.discard_pending();
        if stale > 0 {
            debug!("Discarded {} stale link events", stale);
        }
        self.station_ip = None;
    }

    fn enter_connected(&mut self, ip: Ipv4Addr) {
        info!("Connected, address {}", ip);
        self.station_ip = Some(ip);
        self.set_state(ConnectivityState::Connected);
        self.shared.flags.auto_reconnect_enabled.raise();

        if let Err(e) = self
            .discovery
            .start(&self.settings.hostname, self.settings.http_port)
        {
            warn!("Discovery service failed to start: {}", e);
        }
    }

    fn enter_ap_fallback(&mut self) {
        self.teardown();

        let ap = &self.settings.access_point;
        if let Err(e) = self.radio.start_access_point(ap) {
            error!("Access point failed to start: {}", e);
        }

        let bind = SocketAddr::new(ap.dns_bind, ap.dns_port);
        match self.portal.start(bind, ap.address) {
            Ok(()) => self.shared.flags.handle_captive_dns.raise(),
            Err(e) => error!("Captive portal failed to bind {}: {}", bind, e),
        }

        info!("Access point '{}' at http://{}/", ap.ssid, ap.address);
        self.set_state(ConnectivityState::APFallback);
    }

    /// Act on every queued link event.
    pub fn drain_link_events(&mut self) {
        while let Some(event) = self.events.try_next() {
            self.handle_link_event(event);
        }
    }

    /// Apply one link event to the machine.
    pub fn handle_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Associated => debug!("Associated, waiting for address"),
            LinkEvent::AddressAcquired(ip) => match self.state {
                ConnectivityState::Connecting => self.enter_connected(ip),
                ConnectivityState::Connected if self.station_ip != Some(ip) => {
                    info!("Address changed to {}", ip);
                    self.station_ip = Some(ip);
                    self.shared.publish_link(self.state, self.station_ip);
                }
                _ => debug!("Ignoring address {} in state {}", ip, self.state),
            },
            LinkEvent::LinkLost => {
                if self.shared.flags.auto_reconnect_enabled.take() {
                    warn!("Link lost, reconnecting");
                    self.station_ip = None;
                    self.set_state(ConnectivityState::Connecting);
                    self.reconnect_due = true;
                } else {
                    info!("Link lost in state {}, not reconnecting", self.state);
                }
            }
        }
    }

    /// Whether a link loss asked for a reconnect since the last call.
    pub fn take_reconnect_due(&mut self) -> bool {
        std::mem::take(&mut self.reconnect_due)
    }

    /// Answer at most one captive portal query.
    pub fn poll_captive_dns(&mut self) -> bool {
        self.portal.process_next()
    }

    fn set_state(&mut self, state: ConnectivityState) {
        if self.state != state {
            debug!("Connectivity {} -> {}", self.state, state);
        }
        self.state = state;
        self.shared.publish_link(state, self.station_ip);
    }
}
