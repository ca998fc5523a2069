//! Validation and staging of configuration submitted over HTTP.
//!
//! [`ConfigIngestHandler::ingest`] runs in the network context. It writes the
//! accepted values into [`SharedConfigState`], persists accepted credentials,
//! and raises the matching flags. It never touches a peripheral: the control
//! loop applies the staged values on its next iteration.

use crate::config::{CredentialError, WifiCredentials};
use crate::state::{truncate_display_text, SharedConfigState, MAX_SERVO_ANGLE};
use crate::storage::{save_credentials, SharedStore};
use log::{error, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError};

/// Marquee text field.
pub const FIELD_DATA: &str = "data";
/// Station SSID field.
pub const FIELD_SSID: &str = "ssid";
/// Station passphrase field.
pub const FIELD_PASSWORD: &str = "password";
/// Servo angle field.
pub const FIELD_SERVO_ANGLE: &str = "servo_angle";

/// Why a submitted field was not staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Only one of SSID and passphrase was submitted.
    IncompleteCredentials,
    /// SSID or passphrase out of bounds.
    Credentials(CredentialError),
    /// Angle is empty or has a non-digit character.
    AngleNotNumeric,
    /// Angle parsed but is above 180 (or too large to parse).
    AngleOutOfRange,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteCredentials => write!(f, "ssid and password must be sent together"),
            Self::Credentials(e) => write!(f, "{}", e),
            Self::AngleNotNumeric => write!(f, "servo angle is not a number"),
            Self::AngleOutOfRange => {
                write!(f, "servo angle out of range (0-{})", MAX_SERVO_ANGLE)
            }
        }
    }
}

/// What happened to one field of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldOutcome {
    /// Not part of the submission.
    #[default]
    Absent,
    Accepted,
    /// Accepted after cutting to the display buffer; holds the decoded length
    /// received, which the form reader caps at `MAX_FIELD_LEN`.
    Truncated { from: usize },
    Rejected(Rejection),
}

impl FieldOutcome {
    pub fn is_staged(&self) -> bool {
        matches!(self, Self::Accepted | Self::Truncated { .. })
    }
}

/// Per-field outcome of one [`ConfigIngestHandler::ingest`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub display_text: FieldOutcome,
    pub credentials: FieldOutcome,
    pub servo_angle: FieldOutcome,
}

impl IngestReport {
    /// Every rejection in the submission.
    pub fn rejections(&self) -> impl Iterator<Item = &Rejection> {
        [&self.display_text, &self.credentials, &self.servo_angle]
            .into_iter()
            .filter_map(|outcome| match outcome {
                FieldOutcome::Rejected(r) => Some(r),
                _ => None,
            })
    }
}

/// Parse a servo angle: ASCII digits only, 0..=180.
pub fn parse_servo_angle(raw: &str) -> Result<u8, Rejection> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Rejection::AngleNotNumeric);
    }
    match raw.parse::<u32>() {
        Ok(angle) if angle <= MAX_SERVO_ANGLE as u32 => Ok(angle as u8),
        _ => Err(Rejection::AngleOutOfRange),
    }
}

/// Stages inbound configuration.
#[derive(Clone)]
pub struct ConfigIngestHandler {
    state: Arc<SharedConfigState>,
    store: SharedStore,
}

impl ConfigIngestHandler {
    pub fn new(state: Arc<SharedConfigState>, store: SharedStore) -> Self {
        Self { state, store }
    }

    pub fn state(&self) -> &Arc<SharedConfigState> {
        &self.state
    }

    /// Validate and stage every recognized field of one submission.
    ///
    /// Fields are independent: a rejected angle does not stop new text from
    /// being staged. Unknown fields are ignored.
    pub fn ingest(&self, fields: &HashMap<String, String>) -> IngestReport {
        let report = IngestReport {
            display_text: self.ingest_text(fields.get(FIELD_DATA)),
            credentials: self.ingest_credentials(
                fields.get(FIELD_SSID),
                fields.get(FIELD_PASSWORD),
            ),
            servo_angle: self.ingest_servo_angle(fields.get(FIELD_SERVO_ANGLE)),
        };

        for rejection in report.rejections() {
            warn!("Configuration rejected: {}", rejection);
        }
        report
    }

    fn ingest_text(&self, text: Option<&String>) -> FieldOutcome {
        let Some(text) = text else {
            return FieldOutcome::Absent;
        };
        let staged = truncate_display_text(text);
        let outcome = if staged.len() < text.len() {
            warn!(
                "Display text truncated from {} to {} bytes",
                text.len(),
                staged.len()
            );
            FieldOutcome::Truncated { from: text.len() }
        } else {
            FieldOutcome::Accepted
        };
        info!("Display text staged: {:?}", staged.as_str());
        self.state.stage_display_text(staged);
        self.state.flags.display_changed.raise();
        outcome
    }

    fn ingest_credentials(&self, ssid: Option<&String>, password: Option<&String>) -> FieldOutcome {
        let (ssid, password) = match (ssid, password) {
            (None, None) => return FieldOutcome::Absent,
            (Some(ssid), Some(password)) => (ssid, password),
            _ => return FieldOutcome::Rejected(Rejection::IncompleteCredentials),
        };
        let creds = match WifiCredentials::new(ssid.as_str(), password.as_str()) {
            Ok(creds) => creds,
            Err(e) => return FieldOutcome::Rejected(Rejection::Credentials(e)),
        };

        // Persist what is about to be attempted, even if it turns out unreachable.
        {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = save_credentials(&mut *store, &creds) {
                error!("Failed to persist credentials: {}", e);
            }
        }

        info!("Credentials for '{}' staged, reconnect requested", creds.ssid());
        self.state.stage_credentials(creds);
        self.state.flags.credentials_changed.raise();
        self.state.flags.restart_requested.raise();
        FieldOutcome::Accepted
    }

    fn ingest_servo_angle(&self, raw: Option<&String>) -> FieldOutcome {
        let Some(raw) = raw else {
            return FieldOutcome::Absent;
        };
        match parse_servo_angle(raw) {
            Ok(angle) => {
                info!("Servo target staged: {}", angle);
                self.state.stage_servo_target(angle);
                FieldOutcome::Accepted
            }
            Err(rejection) => FieldOutcome::Rejected(rejection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{DEFAULT_SERVO_ANGLE, DISPLAY_TEXT_CAPACITY};
    use crate::storage::{load_credentials, shared, KeyValueStore, MemoryStore, KEY_SSID};
    use crate::test_support::{form, FlagSet};
    use std::sync::Mutex;

    fn handler() -> (ConfigIngestHandler, Arc<Mutex<MemoryStore>>) {
        let store = Arc::new(Mutex::new(MemoryStore::new()));
        let state = Arc::new(SharedConfigState::default());
        // Boot render request is not what these tests look at
        state.flags.display_changed.take();
        (ConfigIngestHandler::new(state, store.clone()), store)
    }

    // ==================== Credentials ====================

    #[test]
    fn test_credentials_in_bounds_are_staged_and_persisted() {
        let (h, store) = handler();
        let report = h.ingest(&form(&[("ssid", "Home"), ("password", "secret123")]));

        assert_eq!(report.credentials, FieldOutcome::Accepted);
        let expected = WifiCredentials::new("Home", "secret123").unwrap();
        assert_eq!(h.state().credentials(), expected);
        assert_eq!(load_credentials(&*store.lock().unwrap()), Some(expected));
        assert!(h.state().flags.restart_requested.take());
        assert!(h.state().flags.credentials_changed.take());
        assert!(!h.state().flags.restart_requested.is_raised());
    }

    #[test]
    fn test_boundary_lengths_accepted() {
        let (h, _) = handler();
        let ssid = "s".repeat(32);
        let password = "p".repeat(63);
        let report = h.ingest(&form(&[("ssid", &ssid), ("password", &password)]));
        assert!(report.credentials.is_staged());
        assert_eq!(h.state().ssid(), ssid);
    }

    #[test]
    fn test_oversized_ssid_rejected_without_side_effects() {
        let (h, store) = handler();
        let ssid = "s".repeat(33);
        let report = h.ingest(&form(&[("ssid", &ssid), ("password", "secret123")]));

        assert!(matches!(
            report.credentials,
            FieldOutcome::Rejected(Rejection::Credentials(CredentialError::SsidTooLong { .. }))
        ));
        assert_eq!(h.state().credentials(), WifiCredentials::empty());
        assert!(!h.state().flags.restart_requested.is_raised());
        assert!(store.lock().unwrap().is_empty());
    }

    #[test]
    fn test_oversized_password_rejected_without_side_effects() {
        let (h, store) = handler();
        let password = "p".repeat(64);
        let report = h.ingest(&form(&[("ssid", "Home"), ("password", &password)]));

        assert!(matches!(
            report.credentials,
            FieldOutcome::Rejected(Rejection::Credentials(
                CredentialError::PasswordTooLong { .. }
            ))
        ));
        assert_eq!(h.state().ssid(), "");
        assert!(!h.state().flags.restart_requested.is_raised());
        assert!(!h.state().flags.credentials_changed.is_raised());
        assert!(store.lock().unwrap().get(KEY_SSID).unwrap().is_none());
    }

    #[test]
    fn test_ssid_alone_is_rejected() {
        let (h, _) = handler();
        let report = h.ingest(&form(&[("ssid", "Home")]));
        assert_eq!(
            report.credentials,
            FieldOutcome::Rejected(Rejection::IncompleteCredentials)
        );
        assert!(!h.state().flags.restart_requested.is_raised());
    }

    #[test]
    fn test_rejected_update_keeps_previous_credentials() {
        let (h, _) = handler();
        h.ingest(&form(&[("ssid", "Home"), ("password", "secret123")]));
        h.state().flags.restart_requested.take();

        h.ingest(&form(&[("ssid", &"x".repeat(40)), ("password", "pw")]));
        assert_eq!(h.state().ssid(), "Home");
        assert!(!h.state().flags.restart_requested.is_raised());
    }

    // ==================== Servo ====================

    #[test]
    fn test_servo_angle_inputs() {
        let (h, _) = handler();

        h.ingest(&form(&[("servo_angle", "90")]));
        assert_eq!(h.state().servo_target(), 90);

        for bad in ["200", "abc", "", "-5", "9 0", "4294967296", "+10"] {
            let report = h.ingest(&form(&[("servo_angle", bad)]));
            assert!(
                matches!(report.servo_angle, FieldOutcome::Rejected(_)),
                "input {:?}",
                bad
            );
            assert_eq!(h.state().servo_target(), 90, "input {:?}", bad);
        }
    }

    #[test]
    fn test_parse_servo_angle() {
        assert_eq!(parse_servo_angle("0"), Ok(0));
        assert_eq!(parse_servo_angle("180"), Ok(180));
        assert_eq!(parse_servo_angle("007"), Ok(7));
        assert_eq!(parse_servo_angle("181"), Err(Rejection::AngleOutOfRange));
        assert_eq!(parse_servo_angle("abc"), Err(Rejection::AngleNotNumeric));
        assert_eq!(parse_servo_angle(""), Err(Rejection::AngleNotNumeric));
    }

    // ==================== Display ====================

    #[test]
    fn test_display_text_staged() {
        let (h, _) = handler();
        let report = h.ingest(&form(&[("data", "Hello world")]));
        assert_eq!(report.display_text, FieldOutcome::Accepted);
        assert_eq!(h.state().display_text().as_str(), "Hello world");
        assert!(h.state().flags.display_changed.take());
    }

    #[test]
    fn test_long_display_text_truncated() {
        let (h, _) = handler();
        let long = "z".repeat(5000);
        let report = h.ingest(&form(&[("data", &long)]));
        assert_eq!(report.display_text, FieldOutcome::Truncated { from: 5000 });
        assert_eq!(h.state().display_text().len(), DISPLAY_TEXT_CAPACITY);
    }

    #[test]
    fn test_empty_display_text_accepted() {
        let (h, _) = handler();
        h.ingest(&form(&[("data", "")]));
        assert_eq!(h.state().display_text().as_str(), "");
        assert!(h.state().flags.display_changed.is_raised());
    }

    // ==================== Whole submissions ====================

    #[test]
    fn test_absent_fields_leave_state_alone() {
        let (h, _) = handler();
        let report = h.ingest(&form(&[("unrelated", "x")]));
        assert_eq!(report, IngestReport::default());
        assert_eq!(h.state().servo_target(), DEFAULT_SERVO_ANGLE);
        assert_eq!(FlagSet::of(h.state()), FlagSet::default());
    }

    #[test]
    fn test_fields_are_independent() {
        let (h, _) = handler();
        let report = h.ingest(&form(&[("data", "hi"), ("servo_angle", "999")]));
        assert_eq!(report.display_text, FieldOutcome::Accepted);
        assert!(matches!(report.servo_angle, FieldOutcome::Rejected(_)));
        assert_eq!(report.rejections().count(), 1);
        assert_eq!(h.state().display_text().as_str(), "hi");
    }

    #[test]
    fn test_same_submission_twice_is_idempotent() {
        let (h, store) = handler();
        let submission = form(&[
            ("data", "Same"),
            ("ssid", "Home"),
            ("password", "secret123"),
            ("servo_angle", "45"),
        ]);

        h.ingest(&submission);
        let first = (h.state().snapshot(), FlagSet::of(h.state()));
        let stored_first = store.lock().unwrap().clone();

        h.ingest(&submission);
        let second = (h.state().snapshot(), FlagSet::of(h.state()));

        assert_eq!(first, second);
        assert_eq!(
            load_credentials(&stored_first),
            load_credentials(&*store.lock().unwrap())
        );
        assert_eq!(store.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_shared_store_type_accepts_memory_store() {
        let state = Arc::new(SharedConfigState::default());
        let h = ConfigIngestHandler::new(state, shared(MemoryStore::new()));
        assert!(h.ingest(&form(&[("ssid", "a"), ("password", "b")])).credentials.is_staged());
    }
}
