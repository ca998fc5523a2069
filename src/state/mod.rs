//! Configuration state shared between the network context and the control loop.
//!
//! [`SharedConfigState`] is created once at boot, wrapped in an `Arc` and
//! handed to every component that needs it. Each field has one producer and
//! one consumer:
//!
//! | field               | producer             | consumer            |
//! |---------------------|----------------------|---------------------|
//! | credentials         | ingest, factory reset| control loop        |
//! | display text        | ingest               | control loop        |
//! | servo target        | ingest               | control loop        |
//! | connectivity, ip    | state machine        | HTTP page / status  |
//! | flags               | see [`PendingFlags`] |                     |
//!
//! Single bytes and words are atomics. The credentials and text are too large
//! for atomic access, so each sits behind its own mutex whose critical section
//! is a clone or a replace; no driver call is ever made while one is held.

mod flags;

pub use flags::{Flag, PendingFlags};

use crate::config::WifiCredentials;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Display text buffer size including the C-style terminator of the panel
/// driver; the usable capacity is one less.
pub const DISPLAY_BUFFER_SIZE: usize = 1024;

/// Maximum marquee text length in bytes.
pub const DISPLAY_TEXT_CAPACITY: usize = DISPLAY_BUFFER_SIZE - 1;

/// Fixed-capacity marquee text.
pub type DisplayText = heapless::String<DISPLAY_TEXT_CAPACITY>;

/// Text shown until the first configuration arrives.
pub const DEFAULT_DISPLAY_TEXT: &str = "Hello! Configure me at http://marquee.local/";

/// Largest servo angle in degrees.
pub const MAX_SERVO_ANGLE: u8 = 180;

/// Servo target at boot.
pub const DEFAULT_SERVO_ANGLE: u8 = 90;

/// Copy `text` into a [`DisplayText`], cutting at the last char boundary that
/// fits.
pub fn truncate_display_text(text: &str) -> DisplayText {
    let mut end = text.len().min(DISPLAY_TEXT_CAPACITY);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = DisplayText::new();
    // Cannot fail: `end` is within capacity.
    let _ = out.push_str(&text[..end]);
    out
}

/// Connectivity of the device. Only the state machine changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    APFallback = 3,
}

impl ConnectivityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::APFallback => "ap_fallback",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::APFallback,
            _ => Self::Disconnected,
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of everything the configuration page shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub display_text: DisplayText,
    pub ssid: String,
    pub servo_angle: u8,
    pub connectivity: ConnectivityState,
    pub station_ip: Option<Ipv4Addr>,
    pub auto_reconnect: bool,
}

/// The shared configuration record.
pub struct SharedConfigState {
    credentials: Mutex<WifiCredentials>,
    display_text: Mutex<DisplayText>,
    servo_target: AtomicU8,
    connectivity: AtomicU8,
    /// Station address as a big-endian u32; 0 means none.
    station_ip: AtomicU32,
    /// Pending-work flags.
    pub flags: PendingFlags,
    started: Instant,
}

impl SharedConfigState {
    /// Boot-time state seeded with persisted credentials.
    pub fn new(credentials: WifiCredentials) -> Self {
        Self {
            credentials: Mutex::new(credentials),
            display_text: Mutex::new(truncate_display_text(DEFAULT_DISPLAY_TEXT)),
            servo_target: AtomicU8::new(DEFAULT_SERVO_ANGLE),
            connectivity: AtomicU8::new(ConnectivityState::Disconnected as u8),
            station_ip: AtomicU32::new(0),
            flags: PendingFlags::at_boot(),
            started: Instant::now(),
        }
    }

    // ==================== Credentials ====================

    pub fn credentials(&self) -> WifiCredentials {
        lock(&self.credentials).clone()
    }

    /// Replace the staged credentials. Callers raise the flags afterwards.
    pub fn stage_credentials(&self, credentials: WifiCredentials) {
        *lock(&self.credentials) = credentials;
    }

    pub fn ssid(&self) -> String {
        lock(&self.credentials).ssid().to_string()
    }

    // ==================== Display ====================

    pub fn display_text(&self) -> DisplayText {
        lock(&self.display_text).clone()
    }

    pub fn stage_display_text(&self, text: DisplayText) {
        *lock(&self.display_text) = text;
    }

    // ==================== Servo ====================

    pub fn servo_target(&self) -> u8 {
        self.servo_target.load(Ordering::Acquire)
    }

    /// Stage a new target. Values above [`MAX_SERVO_ANGLE`] are clamped.
    pub fn stage_servo_target(&self, angle: u8) {
        self.servo_target
            .store(angle.min(MAX_SERVO_ANGLE), Ordering::Release);
    }

    // ==================== Link status ====================

    pub fn connectivity(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.connectivity.load(Ordering::Acquire))
    }

    pub fn station_ip(&self) -> Option<Ipv4Addr> {
        match self.station_ip.load(Ordering::Acquire) {
            0 => None,
            bits => Some(Ipv4Addr::from(bits)),
        }
    }

    /// Publish the state machine's view for readers in the network context.
    pub fn publish_link(&self, state: ConnectivityState, station_ip: Option<Ipv4Addr>) {
        self.station_ip
            .store(station_ip.map(u32::from).unwrap_or(0), Ordering::Release);
        self.connectivity.store(state as u8, Ordering::Release);
    }

    // ==================== Misc ====================

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            display_text: self.display_text(),
            ssid: self.ssid(),
            servo_angle: self.servo_target(),
            connectivity: self.connectivity(),
            station_ip: self.station_ip(),
            auto_reconnect: self.flags.auto_reconnect_enabled.is_raised(),
        }
    }
}

impl Default for SharedConfigState {
    fn default() -> Self {
        Self::new(WifiCredentials::empty())
    }
}

impl fmt::Debug for SharedConfigState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConfigState")
            .field("snapshot", &self.snapshot())
            .field("flags", &self.flags)
            .finish()
    }
}

/// A panic elsewhere must not wedge the device, and every critical section
/// here is a plain replace or clone, so a poisoned value is still whole.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
