//! WiFi configuration utility for ESP32.
//!
//! Writes station credentials into the `app.settings` NVS namespace, where
//! the firmware reads them at boot.
//!
//! Usage:
//!   WIFI_SSID="MyNetwork" WIFI_PASSWORD="secret" cargo espflash flash --bin configure-wifi --features esp32
//!
//! For open networks (no password):
//!   WIFI_SSID="OpenNetwork" WIFI_PASSWORD="" cargo espflash flash --bin configure-wifi --features esp32

/// WiFi SSID - set via WIFI_SSID environment variable at compile time.
#[cfg(feature = "esp32")]
const WIFI_SSID: Option<&str> = option_env!("WIFI_SSID");

/// WiFi password - set via WIFI_PASSWORD environment variable at compile time.
/// Empty string for open networks.
#[cfg(feature = "esp32")]
const WIFI_PASSWORD: Option<&str> = option_env!("WIFI_PASSWORD");

/// Print error message and halt, pausing so the serial monitor shows it.
#[cfg(feature = "esp32")]
fn halt_with_error(msg: &str) -> ! {
    eprintln!("\n{}", msg);
    eprintln!("\n=== Configuration failed ===\n");
    std::thread::sleep(std::time::Duration::from_secs(2));
    std::process::exit(1);
}

#[cfg(feature = "esp32")]
fn main() {
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use wifi_marquee_esp32::config::CredentialError;
    use wifi_marquee_esp32::storage::{save_credentials, NvsStore};
    use wifi_marquee_esp32::WifiCredentials;

    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    println!("\n=== WiFi Configuration Utility ===\n");

    let ssid = match WIFI_SSID {
        Some(s) if !s.is_empty() => s,
        _ => halt_with_error(
            "Error: WIFI_SSID environment variable not set at compile time.\n\n\
             Usage:\n  \
             WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo espflash flash --bin configure-wifi --features esp32",
        ),
    };
    let password = WIFI_PASSWORD.unwrap_or("");

    println!("SSID: {}", ssid);
    println!(
        "Password: {} ({} chars)",
        if password.is_empty() { "(none)" } else { "****" },
        password.len()
    );

    let credentials = match WifiCredentials::new(ssid, password) {
        Ok(credentials) => credentials,
        Err(CredentialError::SsidTooLong { len, max }) => {
            halt_with_error(&format!("Error: SSID too long ({} bytes, max {})", len, max))
        }
        Err(CredentialError::PasswordTooLong { len, max }) => halt_with_error(&format!(
            "Error: Password too long ({} bytes, max {})",
            len, max
        )),
    };

    let partition = match EspDefaultNvsPartition::take() {
        Ok(partition) => partition,
        Err(e) => halt_with_error(&format!("Error initializing NVS: {:?}", e)),
    };
    let mut store = match NvsStore::new(partition) {
        Ok(store) => store,
        Err(e) => halt_with_error(&format!("Error opening settings: {}", e)),
    };
    if let Err(e) = save_credentials(&mut store, &credentials) {
        halt_with_error(&format!("Error saving to NVS: {}", e));
    }

    println!("\n=== Credentials saved to NVS ===");
    println!("The marquee joins this network on its next boot.");
    println!("\n=== Done - you can disconnect the device ===\n");

    std::thread::sleep(std::time::Duration::from_secs(2));
}

#[cfg(not(feature = "esp32"))]
fn main() {
    eprintln!("This binary must be built for ESP32.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  WIFI_SSID=\"MyNetwork\" WIFI_PASSWORD=\"secret\" cargo espflash flash --bin configure-wifi --features esp32");
    std::process::exit(1);
}
