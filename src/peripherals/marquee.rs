//! Software marquee.
//!
//! Keeps a window of `width` characters sliding across the text, padded with
//! blanks on both sides so the text enters from the right and leaves on the
//! left. Frames are emitted at trace level; a panel driver would push the
//! same window to hardware.

use super::MarqueeDisplay;
use log::{debug, trace};
use std::time::{Duration, Instant};

/// Visible columns.
pub const DEFAULT_MARQUEE_WIDTH: usize = 16;

/// Time between scroll steps.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Scrolling text renderer.
#[derive(Debug)]
pub struct VirtualMarquee {
    width: usize,
    frame_interval: Duration,
    text: Vec<char>,
    offset: usize,
    last_step: Option<Instant>,
    cycles: u32,
    submissions: u32,
}

impl Default for VirtualMarquee {
    fn default() -> Self {
        Self::new(DEFAULT_MARQUEE_WIDTH, DEFAULT_FRAME_INTERVAL)
    }
}

impl VirtualMarquee {
    pub fn new(width: usize, frame_interval: Duration) -> Self {
        Self {
            width: width.max(1),
            frame_interval,
            text: Vec::new(),
            offset: 0,
            last_step: None,
            cycles: 0,
            submissions: 0,
        }
    }

    /// Currently submitted text.
    pub fn text(&self) -> String {
        self.text.iter().collect()
    }

    /// Window currently on the panel.
    pub fn frame(&self) -> String {
        (0..self.width)
            .map(|col| {
                // Column `col` shows text position offset + col - width
                (self.offset + col)
                    .checked_sub(self.width)
                    .and_then(|i| self.text.get(i).copied())
                    .unwrap_or(' ')
            })
            .collect()
    }

    /// Full scroll passes completed since the last submit.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Number of texts submitted.
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    fn steps_per_cycle(&self) -> usize {
        self.text.len() + self.width
    }
}

impl MarqueeDisplay for VirtualMarquee {
    fn reset(&mut self) {
        self.text.clear();
        self.offset = 0;
        self.last_step = None;
    }

    fn submit(&mut self, text: &str) {
        self.text = text.chars().collect();
        self.offset = 0;
        self.cycles = 0;
        self.last_step = None;
        self.submissions += 1;
        debug!("Marquee text: {:?}", text);
    }

    fn animate(&mut self) -> bool {
        if self.text.is_empty() {
            return false;
        }
        let now = Instant::now();
        if let Some(last) = self.last_step {
            if now.duration_since(last) < self.frame_interval {
                return false;
            }
        }
        self.last_step = Some(now);

        self.offset += 1;
        trace!("[{}]", self.frame());
        if self.offset >= self.steps_per_cycle() {
            self.cycles += 1;
            return true;
        }
        false
    }

    fn reset_animation(&mut self) {
        self.offset = 0;
    }
}
