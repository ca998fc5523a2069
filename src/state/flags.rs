//! Dirty flags shared between the network context and the control loop.

use std::sync::atomic::{AtomicBool, Ordering};

/// A single one-bit mailbox.
///
/// The producer writes its data first and then calls [`Flag::raise`]
/// (release). The consumer calls [`Flag::take`] (acquire swap), which both
/// observes and clears the flag, so a raise that lands while the consumer is
/// acting on the previous one is never lost.
#[derive(Debug, Default)]
pub struct Flag(AtomicBool);

impl Flag {
    pub const fn new(raised: bool) -> Self {
        Self(AtomicBool::new(raised))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn lower(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Clear the flag, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// The pending-work flags.
#[derive(Debug, Default)]
pub struct PendingFlags {
    /// New credentials staged; the loop reloads them on the next reconnect.
    pub credentials_changed: Flag,
    /// Tear down and reconnect with the current credentials.
    pub restart_requested: Flag,
    /// New marquee text staged.
    pub display_changed: Flag,
    /// Captive portal is up and wants one query served per loop iteration.
    pub handle_captive_dns: Flag,
    /// A link loss in station mode should trigger a reconnect.
    pub auto_reconnect_enabled: Flag,
}

impl PendingFlags {
    /// Flags in their boot state: only the initial text render is pending.
    pub fn at_boot() -> Self {
        Self {
            display_changed: Flag::new(true),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears() {
        let flag = Flag::default();
        assert!(!flag.take());
        flag.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn test_raises_do_not_accumulate() {
        let flag = Flag::default();
        flag.raise();
        flag.raise();
        assert!(flag.take());
        assert!(!flag.is_raised());
    }

    #[test]
    fn test_boot_state() {
        let flags = PendingFlags::at_boot();
        assert!(flags.display_changed.is_raised());
        assert!(!flags.restart_requested.is_raised());
        assert!(!flags.credentials_changed.is_raised());
        assert!(!flags.handle_captive_dns.is_raised());
        assert!(!flags.auto_reconnect_enabled.is_raised());
    }
}
