//! Host simulator of the marquee firmware.
//!
//! Runs the real state machine, captive portal, web server and control loop
//! against a simulated radio, with settings in a JSON file.
//!
//! # Usage
//!
//! ```bash
//! MARQUEE_HTTP_PORT=8080 MARQUEE_DNS_BIND=127.0.0.1 MARQUEE_DNS_PORT=5353 \
//! MARQUEE_SIM_NETWORKS="Home:secret123" cargo run --bin host-node
//! ```
//!
//! Then open http://localhost:8080/ and submit `Home` / `secret123`.
//!
//! # Console
//!
//! - `drop` - simulate a link loss
//! - `reset` - press the factory reset button
//! - `dns <name>` - query the captive portal
//! - `status` - print the shared state
//! - `help` - list commands

use log::{error, info, warn};
use std::io::BufRead;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use wifi_marquee_esp32::config::AccessPointSettings;
use wifi_marquee_esp32::network::{
    detect_local_ip, link_event_channel, LinkEvent, LinkEventSender, LogDiscovery, SimulatedRadio,
};
use wifi_marquee_esp32::peripherals::{LogServo, SharedButton, VirtualMarquee};
use wifi_marquee_esp32::portal::dns;
use wifi_marquee_esp32::storage::{self, load_credentials, FileStore};
use wifi_marquee_esp32::{
    ConfigApp, ConfigIngestHandler, ConfigServer, ConnectivityStateMachine, ControlLoop,
    DeviceConfig, SharedConfigState, WifiCredentials,
};

/// How long `reset` holds the button down.
const RESET_HOLD: Duration = Duration::from_millis(200);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== WiFi Marquee host node starting ===");

    let config = match DeviceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let store = match FileStore::open_default() {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to open settings: {}", e);
            std::process::exit(1);
        }
    };
    info!("Settings file: {}", store.path().display());
    let credentials = load_credentials(&store).unwrap_or_else(WifiCredentials::empty);
    let shared = Arc::new(SharedConfigState::new(credentials));
    let store = storage::shared(store);

    let networks = std::env::var("MARQUEE_SIM_NETWORKS")
        .map(|list| SimulatedRadio::parse_networks(&list))
        .unwrap_or_default();
    if networks.is_empty() {
        warn!("MARQUEE_SIM_NETWORKS is empty; every connect will fail");
    }
    let station_ip = detect_local_ip().unwrap_or(Ipv4Addr::LOCALHOST);

    let (events_tx, events_rx) = link_event_channel();
    let radio = SimulatedRadio::new(events_tx.clone(), networks, station_ip);
    let machine = ConnectivityStateMachine::new(
        radio,
        LogDiscovery::new(),
        events_rx,
        config.network.clone(),
        shared.clone(),
    );

    let app = ConfigApp::new(ConfigIngestHandler::new(shared.clone(), store.clone()));
    let _server = match ConfigServer::start(None, config.network.http_port, app) {
        Ok(server) => server,
        Err(e) => {
            error!(
                "Failed to start web server on port {}: {}",
                config.network.http_port, e
            );
            std::process::exit(1);
        }
    };

    let button = SharedButton::new();
    spawn_console(
        events_tx,
        button.clone(),
        shared.clone(),
        config.network.access_point.clone(),
    );

    let mut control = ControlLoop::new(
        machine,
        VirtualMarquee::default(),
        shared,
        store,
        config.loop_interval,
    )
    .with_servo(LogServo::new(), config.servo)
    .with_reset_input(Box::new(button));

    control.run()
}

fn spawn_console(
    events: LinkEventSender,
    button: SharedButton,
    shared: Arc<SharedConfigState>,
    ap: AccessPointSettings,
) {
    let spawned = thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let mut words = line.split_whitespace();
                match (words.next(), words.next()) {
                    (Some("drop"), _) => {
                        info!("Console: simulating link loss");
                        events.notify(LinkEvent::LinkLost);
                    }
                    (Some("reset"), _) => {
                        info!("Console: factory reset button");
                        button.press();
                        thread::sleep(RESET_HOLD);
                        button.release();
                    }
                    (Some("dns"), Some(name)) => query_portal(&ap, name),
                    (Some("status"), _) => print_status(&shared),
                    (Some(_), _) => {
                        println!("Commands: drop | reset | dns <name> | status | help")
                    }
                    (None, _) => {}
                }
            }
        });
    if let Err(e) = spawned {
        warn!("Console unavailable: {}", e);
    }
}

fn print_status(shared: &SharedConfigState) {
    let snap = shared.snapshot();
    println!("state:          {}", snap.connectivity);
    match snap.station_ip {
        Some(ip) => println!("station ip:     {}", ip),
        None => println!("station ip:     -"),
    }
    println!("ssid:           {}", snap.ssid);
    println!("auto reconnect: {}", snap.auto_reconnect);
    println!("servo target:   {}", snap.servo_angle);
    println!("text:           {}", snap.display_text.as_str());
    println!("uptime:         {}s", shared.uptime().as_secs());
}

fn query_portal(ap: &AccessPointSettings, name: &str) {
    let target = match ap.dns_bind {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), ap.dns_port)
        }
        ip => SocketAddr::new(ip, ap.dns_port),
    };
    let result = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).and_then(|socket| {
        socket.set_read_timeout(Some(Duration::from_secs(2)))?;
        socket.send_to(&dns::encode_query(1, name, 1), target)?;
        let mut buf = [0u8; dns::MAX_MESSAGE_LEN];
        let (len, _) = socket.recv_from(&mut buf)?;
        Ok(dns::answer_address(&buf[..len]))
    });
    match result {
        Ok(Some(ip)) => println!("{} -> {}", name, ip),
        Ok(None) => println!("{}: unexpected reply", name),
        Err(e) => println!("{}: no answer from {} ({})", name, target, e),
    }
}
