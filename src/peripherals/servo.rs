//! Servo drivers.

use super::{PeripheralError, Servo};
use log::info;

/// Servo stand-in that logs and remembers each pulse.
#[derive(Debug, Default)]
pub struct LogServo {
    last_pulse_us: Option<u32>,
    moves: u32,
}

impl LogServo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_pulse_us(&self) -> Option<u32> {
        self.last_pulse_us
    }

    /// Number of drive commands received.
    pub fn moves(&self) -> u32 {
        self.moves
    }
}

impl Servo for LogServo {
    fn drive(&mut self, pulse_us: u32) -> Result<(), PeripheralError> {
        info!("Servo pulse {} us", pulse_us);
        self.last_pulse_us = Some(pulse_us);
        self.moves += 1;
        Ok(())
    }
}

#[cfg(feature = "esp32")]
mod ledc {
    use super::super::{PeripheralError, Servo};
    use esp_idf_hal::gpio::OutputPin;
    use esp_idf_hal::ledc::config::TimerConfig;
    use esp_idf_hal::ledc::{LedcChannel, LedcDriver, LedcTimer, LedcTimerDriver, Resolution};
    use esp_idf_hal::peripheral::Peripheral;
    use esp_idf_hal::units::Hertz;
    use log::{debug, info};

    /// Servo frame rate.
    const SERVO_FREQUENCY: Hertz = Hertz(50);

    /// One 50 Hz period in microseconds.
    const PERIOD_US: u32 = 20_000;

    /// Servo on an LEDC channel at 50 Hz, 14-bit duty.
    pub struct LedcServo<'d> {
        driver: LedcDriver<'d>,
        max_duty: u32,
    }

    impl<'d> LedcServo<'d> {
        pub fn new<C, T>(
            channel: impl Peripheral<P = C> + 'd,
            timer: impl Peripheral<P = T> + 'd,
            pin: impl Peripheral<P = impl OutputPin> + 'd,
        ) -> Result<Self, PeripheralError>
        where
            C: LedcChannel<SpeedMode = <T as LedcTimer>::SpeedMode>,
            T: LedcTimer + 'd,
        {
            let timer_config = TimerConfig::default()
                .frequency(SERVO_FREQUENCY)
                .resolution(Resolution::Bits14);
            let timer = LedcTimerDriver::new(timer, &timer_config)?;
            let driver = LedcDriver::new(channel, timer, pin)?;
            let max_duty = driver.get_max_duty();
            info!("Servo on LEDC, max duty {}", max_duty);
            Ok(Self { driver, max_duty })
        }
    }

    impl Servo for LedcServo<'_> {
        fn drive(&mut self, pulse_us: u32) -> Result<(), PeripheralError> {
            if pulse_us > PERIOD_US {
                return Err(PeripheralError::PulseOutOfRange(pulse_us));
            }
            let duty = (u64::from(pulse_us) * u64::from(self.max_duty) / u64::from(PERIOD_US)) as u32;
            debug!("Servo pulse {} us, duty {}", pulse_us, duty);
            self.driver.set_duty(duty)?;
            Ok(())
        }
    }
}

#[cfg(feature = "esp32")]
pub use ledc::LedcServo;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_servo_records_pulses() {
        let mut servo = LogServo::new();
        assert_eq!(servo.last_pulse_us(), None);
        servo.drive(1500).unwrap();
        servo.drive(2500).unwrap();
        assert_eq!(servo.last_pulse_us(), Some(2500));
        assert_eq!(servo.moves(), 2);
    }
}
