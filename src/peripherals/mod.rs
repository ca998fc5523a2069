//! Output and input peripherals driven by the control loop.
//!
//! Only the control loop holds these; nothing in the network context ever
//! calls a peripheral.
//!
//! | trait              | host             | ESP32 (`esp32` feature) |
//! |--------------------|------------------|-------------------------|
//! | [`MarqueeDisplay`] | [`VirtualMarquee`] | [`VirtualMarquee`]    |
//! | [`Servo`]          | [`LogServo`]     | [`LedcServo`]           |
//! | [`ResetInput`]     | [`SharedButton`] | [`BootButton`]          |

mod button;
mod marquee;
mod servo;

#[cfg(feature = "esp32")]
pub use button::BootButton;
pub use button::SharedButton;
pub use marquee::{VirtualMarquee, DEFAULT_FRAME_INTERVAL, DEFAULT_MARQUEE_WIDTH};
#[cfg(feature = "esp32")]
pub use servo::LedcServo;
pub use servo::LogServo;

use std::fmt;

/// Scrolling text display.
pub trait MarqueeDisplay {
    /// Clear the panel and forget the current text.
    fn reset(&mut self);
    /// Start scrolling `text` from the beginning.
    fn submit(&mut self, text: &str);
    /// Advance at most one frame. Returns true when the text has scrolled
    /// fully off the panel.
    fn animate(&mut self) -> bool;
    /// Restart the scroll of the current text.
    fn reset_animation(&mut self);
}

/// Hobby servo on a 50 Hz PWM line.
pub trait Servo {
    /// Hold the given pulse width until told otherwise.
    fn drive(&mut self, pulse_us: u32) -> Result<(), PeripheralError>;
}

/// Factory reset trigger.
pub trait ResetInput {
    fn is_pressed(&mut self) -> bool;
}

/// Turns a sampled level into rising-edge events.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// True only on the sample where the level goes from low to high.
    pub fn rising(&mut self, level: bool) -> bool {
        let rose = level && !self.last;
        self.last = level;
        rose
    }
}

/// Peripheral driver errors.
#[derive(Debug)]
pub enum PeripheralError {
    /// Pulse width the driver cannot produce.
    PulseOutOfRange(u32),
    /// ESP-IDF error.
    #[cfg(feature = "esp32")]
    Esp(esp_idf_sys::EspError),
}

impl fmt::Display for PeripheralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PulseOutOfRange(us) => write!(f, "pulse width {} us out of range", us),
            #[cfg(feature = "esp32")]
            Self::Esp(e) => write!(f, "ESP error: {:?}", e),
        }
    }
}

impl std::error::Error for PeripheralError {}

#[cfg(feature = "esp32")]
impl From<esp_idf_sys::EspError> for PeripheralError {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Self::Esp(e)
    }
}
