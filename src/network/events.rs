//! Link-status notifications.
//!
//! Radio driver callbacks run in a context the control loop does not own, so
//! they never act on a notification themselves. They enqueue a [`LinkEvent`]
//! on a bounded channel and the state machine drains it from inside the loop.

use log::warn;
use std::net::Ipv4Addr;
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};

/// Queue depth. A burst larger than this means the loop is stalled, and the
/// oldest information is still in the queue.
pub const LINK_EVENT_CAPACITY: usize = 16;

/// A link-status notification from the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Associated with the access point; no address yet.
    Associated,
    /// Station got an address.
    AddressAcquired(Ipv4Addr),
    /// Station link dropped.
    LinkLost,
}

/// Producer half, cloned into every driver callback.
#[derive(Debug, Clone)]
pub struct LinkEventSender {
    tx: SyncSender<LinkEvent>,
}

impl LinkEventSender {
    /// Enqueue without blocking. Drops the event if the queue is full.
    pub fn notify(&self, event: LinkEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Link event queue full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(event)) => {
                log::debug!("Link event receiver gone, dropping {:?}", event);
            }
        }
    }
}

/// Consumer half, owned by the connectivity state machine.
#[derive(Debug)]
pub struct LinkEventReceiver {
    rx: Receiver<LinkEvent>,
}

impl LinkEventReceiver {
    /// Next queued event, if any.
    pub fn try_next(&self) -> Option<LinkEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drop everything queued so far, returning how many events were dropped.
    pub fn discard_pending(&self) -> usize {
        let mut count = 0;
        while self.try_next().is_some() {
            count += 1;
        }
        count
    }
}

/// Create a bounded link-event queue of [`LINK_EVENT_CAPACITY`].
pub fn link_event_channel() -> (LinkEventSender, LinkEventReceiver) {
    let (tx, rx) = mpsc::sync_channel(LINK_EVENT_CAPACITY);
    (LinkEventSender { tx }, LinkEventReceiver { rx })
}
