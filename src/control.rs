//! The cooperative control loop.
//!
//! The only context that drives hardware. Each [`ControlLoop::run_once`]
//! performs, in order:
//!
//! 1. one captive portal DNS query, while the portal is up
//! 2. factory reset sampling, link events, and a reconnect if one was asked for
//! 3. a display restart with new text, if text was staged
//! 4. one marquee animation frame
//! 5. one servo command, if the staged angle differs from the applied one
//!
//! Only step 2 can block, for at most the connect policy's ceiling.

use crate::config::{ServoPulseRange, WifiCredentials};
use crate::connectivity::ConnectivityStateMachine;
use crate::network::{Discovery, Radio};
use crate::peripherals::{EdgeDetector, MarqueeDisplay, ResetInput, Servo};
use crate::state::SharedConfigState;
use crate::storage::{clear_settings, SharedStore};
use log::{error, info, warn};
use std::sync::{Arc, PoisonError};
use std::thread;
use std::time::Duration;

/// Control loop over a state machine and the output peripherals.
pub struct ControlLoop<R: Radio, D: Discovery, M: MarqueeDisplay, S: Servo> {
    machine: ConnectivityStateMachine<R, D>,
    display: M,
    servo: Option<S>,
    servo_range: ServoPulseRange,
    /// Angle last commanded; `None` until the first command.
    applied_angle: Option<u8>,
    reset_input: Option<Box<dyn ResetInput>>,
    reset_edge: EdgeDetector,
    shared: Arc<SharedConfigState>,
    store: SharedStore,
    interval: Duration,
}

impl<R: Radio, D: Discovery, M: MarqueeDisplay, S: Servo> ControlLoop<R, D, M, S> {
    pub fn new(
        machine: ConnectivityStateMachine<R, D>,
        display: M,
        shared: Arc<SharedConfigState>,
        store: SharedStore,
        interval: Duration,
    ) -> Self {
        Self {
            machine,
            display,
            servo: None,
            servo_range: ServoPulseRange::default(),
            applied_angle: None,
            reset_input: None,
            reset_edge: EdgeDetector::new(),
            shared,
            store,
            interval,
        }
    }

    /// Attach a servo driven over `range`.
    pub fn with_servo(mut self, servo: S, range: ServoPulseRange) -> Self {
        self.servo = Some(servo);
        self.servo_range = range;
        self
    }

    /// Attach a factory reset input.
    pub fn with_reset_input(mut self, input: Box<dyn ResetInput>) -> Self {
        self.reset_input = Some(input);
        self
    }

    pub fn machine(&self) -> &ConnectivityStateMachine<R, D> {
        &self.machine
    }

    pub fn display(&self) -> &M {
        &self.display
    }

    pub fn servo(&self) -> Option<&S> {
        self.servo.as_ref()
    }

    pub fn applied_angle(&self) -> Option<u8> {
        self.applied_angle
    }

    /// Leave `Disconnected` with the boot credentials.
    pub fn boot(&mut self) {
        info!("Control loop starting");
        self.machine.reconnect();
    }

    /// One iteration.
    pub fn run_once(&mut self) {
        // 1. Captive portal
        if self.shared.flags.handle_captive_dns.is_raised() {
            self.machine.poll_captive_dns();
        }

        // 2. Connectivity
        if self.sample_reset_input() {
            self.factory_reset();
        }
        self.machine.drain_link_events();
        let link_lost = self.machine.take_reconnect_due();
        let restart = self.shared.flags.restart_requested.take();
        if restart || link_lost {
            if self.shared.flags.credentials_changed.take() {
                info!("Reconnecting with new credentials for '{}'", self.shared.ssid());
                self.machine.reload_credentials();
            }
            self.machine.reconnect();
        }

        // 3. New text
        if self.shared.flags.display_changed.take() {
            self.display.reset();
            self.display.submit(&self.shared.display_text());
        }

        // 4. Animation
        if self.display.animate() {
            self.display.reset_animation();
        }

        // 5. Servo
        self.apply_servo_target();
    }

    /// Boot, then iterate forever.
    pub fn run(&mut self) -> ! {
        self.boot();
        loop {
            self.run_once();
            thread::sleep(self.interval);
        }
    }

    fn sample_reset_input(&mut self) -> bool {
        match self.reset_input.as_mut() {
            Some(input) => {
                let level = input.is_pressed();
                self.reset_edge.rising(level)
            }
            None => false,
        }
    }

    /// Wipe persisted and in-memory credentials and request a reconnect,
    /// which then lands in access point mode.
    fn factory_reset(&mut self) {
        warn!("Factory reset");
        {
            let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
            if let Err(e) = clear_settings(&mut *store) {
                error!("Failed to clear settings: {}", e);
            }
        }
        self.shared.stage_credentials(WifiCredentials::empty());
        self.shared.flags.credentials_changed.raise();
        self.shared.flags.restart_requested.raise();
    }

    fn apply_servo_target(&mut self) {
        let Some(servo) = self.servo.as_mut() else {
            return;
        };
        let target = self.shared.servo_target();
        if self.applied_angle == Some(target) {
            return;
        }
        let pulse = self.servo_range.pulse_us(target);
        if let Err(e) = servo.drive(pulse) {
            error!("Servo command for {} degrees failed: {}", target, e);
        }
        // Once per change, even on failure
        self.applied_angle = Some(target);
    }
}
