//! Device configuration.
//!
//! Fixed firmware constants live here, grouped into [`DeviceConfig`]. The
//! device build uses [`DeviceConfig::default`]; the host simulator can
//! override individual values from `MARQUEE_*` environment variables.
//!
//! # Components
//!
//! - [`credentials`] - station credentials and their validation

mod credentials;

pub use credentials::{CredentialError, WifiCredentials, MAX_PASSWORD_LEN, MAX_SSID_LEN};

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Fallback access point SSID.
pub const DEFAULT_AP_SSID: &str = "Marquee-Setup";

/// Fallback access point passphrase (WPA2 needs at least 8 bytes).
pub const DEFAULT_AP_PASSWORD: &str = "marquee-setup";

/// Fixed address of the device on its own access point.
pub const DEFAULT_AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

/// Prefix length of the access point subnet.
pub const DEFAULT_AP_PREFIX_LEN: u8 = 24;

/// Captive portal DNS port.
pub const DNS_PORT: u16 = 53;

/// Configuration page port.
pub const HTTP_PORT: u16 = 80;

/// mDNS hostname, reachable as `marquee.local` in station mode.
pub const DEFAULT_HOSTNAME: &str = "marquee";

/// Station connect attempts before falling back to access point mode.
pub const CONNECT_ATTEMPTS: u32 = 20;

/// Delay between connect polls. 20 x 500 ms gives a ~10 s ceiling.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// Sleep between control loop iterations on device.
pub const LOOP_INTERVAL: Duration = Duration::from_millis(2);

/// Servo pulse width at 0 degrees, microseconds.
pub const SERVO_MIN_PULSE_US: u32 = 500;

/// Servo pulse width at 180 degrees, microseconds.
pub const SERVO_MAX_PULSE_US: u32 = 2500;

/// Minimum WPA2 passphrase length, enforced for the fallback AP only.
const MIN_AP_PASSWORD_LEN: usize = 8;

/// Bounded station connect poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    /// Number of polls before giving up.
    pub attempts: u32,
    /// Delay after each poll.
    pub interval: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            attempts: CONNECT_ATTEMPTS,
            interval: CONNECT_RETRY_INTERVAL,
        }
    }
}

impl ConnectPolicy {
    /// Upper bound on time spent connecting, saturating at `Duration::MAX`.
    pub fn ceiling(&self) -> Duration {
        self.interval
            .checked_mul(self.attempts)
            .unwrap_or(Duration::MAX)
    }
}

/// Fallback access point and captive portal settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPointSettings {
    pub ssid: String,
    pub password: String,
    /// Device address on the AP network; also the answer to every DNS query.
    pub address: Ipv4Addr,
    pub prefix_len: u8,
    /// Address the DNS responder binds to. Same as `address` on device.
    pub dns_bind: IpAddr,
    pub dns_port: u16,
}

impl Default for AccessPointSettings {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_AP_SSID.to_string(),
            password: DEFAULT_AP_PASSWORD.to_string(),
            address: DEFAULT_AP_ADDRESS,
            prefix_len: DEFAULT_AP_PREFIX_LEN,
            dns_bind: IpAddr::V4(DEFAULT_AP_ADDRESS),
            dns_port: DNS_PORT,
        }
    }
}

/// Everything the connectivity state machine needs besides credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSettings {
    pub access_point: AccessPointSettings,
    pub hostname: String,
    pub http_port: u16,
    pub connect: ConnectPolicy,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            access_point: AccessPointSettings::default(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            http_port: HTTP_PORT,
            connect: ConnectPolicy::default(),
        }
    }
}

/// Servo pulse widths for the ends of its 0..=180 degree travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoPulseRange {
    pub min_us: u32,
    pub max_us: u32,
}

impl Default for ServoPulseRange {
    fn default() -> Self {
        Self {
            min_us: SERVO_MIN_PULSE_US,
            max_us: SERVO_MAX_PULSE_US,
        }
    }
}

impl ServoPulseRange {
    /// Pulse width for `angle`, linear between the ends. Angles past 180
    /// are clamped.
    pub fn pulse_us(&self, angle: u8) -> u32 {
        let angle = u32::from(angle.min(180));
        self.min_us + angle * self.max_us.saturating_sub(self.min_us) / 180
    }
}

/// Full device configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub network: NetworkSettings,
    pub servo: ServoPulseRange,
    pub loop_interval: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            network: NetworkSettings::default(),
            servo: ServoPulseRange::default(),
            loop_interval: LOOP_INTERVAL,
        }
    }
}

impl DeviceConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let net = &mut config.network;

        if let Some(port) = parse_var(&lookup, "MARQUEE_HTTP_PORT")? {
            net.http_port = port;
        }
        if let Some(port) = parse_var(&lookup, "MARQUEE_DNS_PORT")? {
            net.access_point.dns_port = port;
        }
        if let Some(addr) = parse_var(&lookup, "MARQUEE_DNS_BIND")? {
            net.access_point.dns_bind = addr;
        }
        if let Some(ssid) = lookup("MARQUEE_AP_SSID") {
            if ssid.is_empty() || ssid.len() > MAX_SSID_LEN {
                return Err(ConfigError::invalid("MARQUEE_AP_SSID", &ssid));
            }
            net.access_point.ssid = ssid;
        }
        if let Some(password) = lookup("MARQUEE_AP_PASSWORD") {
            if password.len() < MIN_AP_PASSWORD_LEN || password.len() > MAX_PASSWORD_LEN {
                return Err(ConfigError::invalid("MARQUEE_AP_PASSWORD", "<redacted>"));
            }
            net.access_point.password = password;
        }
        if let Some(hostname) = lookup("MARQUEE_HOSTNAME") {
            if hostname.is_empty() {
                return Err(ConfigError::invalid("MARQUEE_HOSTNAME", &hostname));
            }
            net.hostname = hostname;
        }
        if let Some(attempts) = parse_var(&lookup, "MARQUEE_CONNECT_ATTEMPTS")? {
            net.connect.attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MARQUEE_CONNECT_INTERVAL_MS")? {
            net.connect.interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MARQUEE_LOOP_INTERVAL_MS")? {
            config.loop_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::invalid(key, &raw)),
    }
}

/// Errors from building a [`DeviceConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An override variable held an unusable value.
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        Self::InvalidValue {
            key,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value for {}: '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DeviceConfig::default();
        let ap = &config.network.access_point;
        assert_eq!(ap.address, Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(ap.prefix_len, 24);
        assert_eq!(ap.dns_port, 53);
        assert_eq!(ap.dns_bind, IpAddr::V4(ap.address));
        assert_eq!(config.network.http_port, 80);
        assert_eq!(config.network.hostname, "marquee");
    }

    #[test]
    fn test_connect_ceiling() {
        let policy = ConnectPolicy::default();
        assert_eq!(policy.attempts, 20);
        assert_eq!(policy.ceiling(), Duration::from_secs(10));
    }

    #[test]
    fn test_connect_ceiling_saturates() {
        let policy = ConnectPolicy {
            attempts: u32::MAX,
            interval: Duration::from_millis(u64::MAX),
        };
        assert_eq!(policy.ceiling(), Duration::MAX);
    }

    #[test]
    fn test_servo_pulse_range() {
        let range = ServoPulseRange::default();
        assert_eq!(range.pulse_us(0), 500);
        assert_eq!(range.pulse_us(90), 1500);
        assert_eq!(range.pulse_us(180), 2500);
        assert_eq!(range.pulse_us(255), 2500);

        let narrow = ServoPulseRange {
            min_us: 1000,
            max_us: 2000,
        };
        assert_eq!(narrow.pulse_us(45), 1250);
    }

    #[test]
    fn test_empty_environment_is_default() {
        let config = DeviceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, DeviceConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = DeviceConfig::from_lookup(lookup_from(&[
            ("MARQUEE_HTTP_PORT", "8080"),
            ("MARQUEE_DNS_PORT", "5353"),
            ("MARQUEE_DNS_BIND", "127.0.0.1"),
            ("MARQUEE_AP_SSID", "Lab"),
            ("MARQUEE_HOSTNAME", "sign"),
            ("MARQUEE_CONNECT_ATTEMPTS", "3"),
            ("MARQUEE_CONNECT_INTERVAL_MS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.network.http_port, 8080);
        assert_eq!(config.network.access_point.dns_port, 5353);
        assert_eq!(
            config.network.access_point.dns_bind,
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        );
        assert_eq!(config.network.access_point.ssid, "Lab");
        assert_eq!(config.network.hostname, "sign");
        assert_eq!(config.network.connect.attempts, 3);
        assert_eq!(config.network.connect.interval, Duration::from_millis(10));
    }

    #[test]
    fn test_invalid_port() {
        let result = DeviceConfig::from_lookup(lookup_from(&[("MARQUEE_HTTP_PORT", "http")]));
        assert_eq!(
            result,
            Err(ConfigError::InvalidValue {
                key: "MARQUEE_HTTP_PORT",
                value: "http".to_string()
            })
        );
    }

    #[test]
    fn test_short_ap_password_rejected() {
        let result = DeviceConfig::from_lookup(lookup_from(&[("MARQUEE_AP_PASSWORD", "short")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                key: "MARQUEE_AP_PASSWORD",
                ..
            })
        ));
    }
}
