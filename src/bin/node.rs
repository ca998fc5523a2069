//! Marquee firmware.
//!
//! - **ESP32**: `cargo espflash flash --bin node --features esp32 --release`
//!
//! On boot the device joins the stored network. With no stored network, or
//! one it cannot reach within ~10 s, it starts the `Marquee-Setup` access
//! point and answers every DNS query with 192.168.1.1 so the configuration
//! page opens by itself. Holding BOOT clears the stored network.
//!
//! For a host run use the `host-node` binary.

#[cfg(feature = "esp32")]
fn main() {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("=== WiFi Marquee starting ===");

    if let Err(e) = firmware::run() {
        log::error!("Fatal: {}", e);
        // Give the log a moment to drain, then start over
        std::thread::sleep(std::time::Duration::from_secs(5));
        esp_idf_hal::reset::restart();
    }
}

#[cfg(feature = "esp32")]
mod firmware {
    use esp_idf_hal::gpio::IOPin;
    use esp_idf_hal::peripherals::Peripherals;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::info;
    use std::sync::Arc;
    use wifi_marquee_esp32::network::link_event_channel;
    use wifi_marquee_esp32::peripherals::{BootButton, LedcServo, VirtualMarquee};
    use wifi_marquee_esp32::storage::{self, load_credentials, NvsStore};
    use wifi_marquee_esp32::wifi::{EspRadio, MdnsDiscovery};
    use wifi_marquee_esp32::{
        ConfigApp, ConfigIngestHandler, ConfigServer, ConnectivityStateMachine, ControlLoop,
        DeviceConfig, SharedConfigState, WifiCredentials,
    };

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        let peripherals = Peripherals::take()?;
        let sysloop = EspSystemEventLoop::take()?;
        let nvs_partition = EspDefaultNvsPartition::take()?;
        let config = DeviceConfig::default();

        // Seed the shared state from flash
        let store = NvsStore::new(nvs_partition.clone())?;
        let credentials = load_credentials(&store).unwrap_or_else(WifiCredentials::empty);
        if credentials.is_configured() {
            info!("Stored network: '{}'", credentials.ssid());
        }
        let shared = Arc::new(SharedConfigState::new(credentials));
        let store = storage::shared(store);

        let (events_tx, events_rx) = link_event_channel();
        let radio = EspRadio::new(peripherals.modem, sysloop, Some(nvs_partition), events_tx)?;
        let machine = ConnectivityStateMachine::new(
            radio,
            MdnsDiscovery::new(),
            events_rx,
            config.network.clone(),
            shared.clone(),
        );

        // Network context; lives as long as `run`
        let app = ConfigApp::new(ConfigIngestHandler::new(shared.clone(), store.clone()));
        let _server = ConfigServer::start(None, config.network.http_port, app)?;

        let servo = LedcServo::new(
            peripherals.ledc.channel0,
            peripherals.ledc.timer0,
            peripherals.pins.gpio18,
        )?;
        let button = BootButton::new(peripherals.pins.gpio0.downgrade())?;

        let mut control = ControlLoop::new(
            machine,
            VirtualMarquee::default(),
            shared,
            store,
            config.loop_interval,
        )
        .with_servo(servo, config.servo)
        .with_reset_input(Box::new(button));

        control.run()
    }
}

#[cfg(not(feature = "esp32"))]
fn main() {
    eprintln!("This binary must be built for ESP32 (--features esp32).");
    eprintln!();
    eprintln!("To run the firmware logic on this machine:");
    eprintln!("  cargo run --bin host-node");
    std::process::exit(1);
}
