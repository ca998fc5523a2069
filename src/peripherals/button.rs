//! Factory reset inputs.

use super::ResetInput;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Software button. Clones share one level, so a console or test can press
/// the button the control loop samples.
#[derive(Debug, Clone, Default)]
pub struct SharedButton {
    level: Arc<AtomicBool>,
}

impl SharedButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.level.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.level.store(false, Ordering::Release);
    }
}

impl ResetInput for SharedButton {
    fn is_pressed(&mut self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

#[cfg(feature = "esp32")]
mod boot {
    use super::super::{PeripheralError, ResetInput};
    use esp_idf_hal::gpio::{AnyIOPin, Input, PinDriver, Pull};

    /// The BOOT button (GPIO0 on most boards), active low with pull-up.
    pub struct BootButton<'d> {
        pin: PinDriver<'d, AnyIOPin, Input>,
    }

    impl<'d> BootButton<'d> {
        pub fn new(pin: AnyIOPin) -> Result<Self, PeripheralError> {
            let mut pin = PinDriver::input(pin)?;
            pin.set_pull(Pull::Up)?;
            Ok(Self { pin })
        }
    }

    impl ResetInput for BootButton<'_> {
        fn is_pressed(&mut self) -> bool {
            self.pin.is_low()
        }
    }
}

#[cfg(feature = "esp32")]
pub use boot::BootButton;
