//! WiFi station credentials.
//!
//! Platform-independent and host-testable. Lengths are in bytes, which is what
//! the radio driver and NVS both count.
//!
//! # Example
//!
//! ```
//! use wifi_marquee_esp32::config::WifiCredentials;
//!
//! let creds = WifiCredentials::new("MyNetwork", "MyPassword").unwrap();
//! assert!(creds.is_configured());
//! assert!(!WifiCredentials::empty().is_configured());
//! ```

use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum passphrase length for WPA2-PSK.
pub const MAX_PASSWORD_LEN: usize = 63;

/// Station credentials.
///
/// An empty SSID means "no credentials configured"; connecting with it sends
/// the device straight to access-point fallback.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WifiCredentials {
    ssid: String,
    password: String,
}

impl WifiCredentials {
    /// Create credentials, checking both length bounds.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, CredentialError> {
        let creds = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Credentials representing "nothing configured".
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check the length bounds.
    pub fn validate(&self) -> Result<(), CredentialError> {
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(CredentialError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(CredentialError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// True when an SSID is present.
    pub fn is_configured(&self) -> bool {
        !self.ssid.is_empty()
    }

    /// True for open networks (no passphrase).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// Never print the passphrase, not even at trace level.
impl fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .finish()
    }
}

/// Credential validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// SSID exceeds maximum length.
    SsidTooLong { len: usize, max: usize },
    /// Passphrase exceeds maximum length.
    PasswordTooLong { len: usize, max: usize },
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SsidTooLong { len, max } => {
                write!(f, "SSID too long: {} bytes (max {})", len, max)
            }
            Self::PasswordTooLong { len, max } => {
                write!(f, "password too long: {} bytes (max {})", len, max)
            }
        }
    }
}

impl std::error::Error for CredentialError {}
