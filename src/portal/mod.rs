//! Captive portal DNS responder.
//!
//! While the device runs its own access point, every name lookup is answered
//! with the device's address so that any page a client opens lands on the
//! configuration page. The responder is polled from the control loop, one
//! query per call, and never blocks.

pub mod dns;

use dns::MAX_MESSAGE_LEN;
use log::{debug, info, trace, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// Wildcard DNS responder.
#[derive(Debug)]
pub struct CaptivePortalResponder {
    socket: Option<UdpSocket>,
    answer: Ipv4Addr,
    frame: [u8; MAX_MESSAGE_LEN],
    response: [u8; MAX_MESSAGE_LEN],
    answered: u64,
}

impl Default for CaptivePortalResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptivePortalResponder {
    /// A stopped responder.
    pub fn new() -> Self {
        Self {
            socket: None,
            answer: Ipv4Addr::UNSPECIFIED,
            frame: [0; MAX_MESSAGE_LEN],
            response: [0; MAX_MESSAGE_LEN],
            answered: 0,
        }
    }

    /// Bind to `bind` and start answering every query with `answer`.
    ///
    /// Restarting an active responder rebinds it.
    pub fn start(&mut self, bind: SocketAddr, answer: Ipv4Addr) -> io::Result<()> {
        self.stop();
        let socket = UdpSocket::bind(bind)?;
        socket.set_nonblocking(true)?;
        info!("Captive portal DNS on {} answering {}", socket.local_addr()?, answer);
        self.socket = Some(socket);
        self.answer = answer;
        self.answered = 0;
        Ok(())
    }

    /// Close the socket. Queries still in flight are never answered.
    pub fn stop(&mut self) {
        if self.socket.take().is_some() {
            info!("Captive portal DNS stopped after {} answers", self.answered);
        }
    }

    pub fn is_active(&self) -> bool {
        self.socket.is_some()
    }

    /// Bound address while active.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref()?.local_addr().ok()
    }

    /// Queries answered since the last start.
    pub fn answered(&self) -> u64 {
        self.answered
    }

    /// Answer at most one pending query. Returns true if one was answered.
    pub fn process_next(&mut self) -> bool {
        let Some(socket) = self.socket.as_ref() else {
            return false;
        };

        let (len, remote) = match socket.recv_from(&mut self.frame) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
            Err(e) => {
                warn!("DNS receive error: {}", e);
                return false;
            }
        };

        let query = &self.frame[..len];
        let Some(question) = dns::parse_question(query) else {
            trace!("Ignoring malformed DNS packet from {}", remote);
            return false;
        };

        let Some(resp_len) = dns::build_answer(query, &question, self.answer, &mut self.response)
        else {
            trace!("DNS response for {} does not fit", remote);
            return false;
        };

        if let Err(e) = socket.send_to(&self.response[..resp_len], remote) {
            warn!("DNS send error: {}", e);
            return false;
        }

        self.answered += 1;
        let name = if question.name.is_empty() {
            "(root)"
        } else {
            question.name.as_str()
        };
        debug!("DNS {} -> {} (qtype {})", name, self.answer, question.qtype);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ask_portal, LOCALHOST_ANY_PORT};

    const AP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);

    #[test]
    fn test_stopped_responder_is_inert() {
        let mut portal = CaptivePortalResponder::new();
        assert!(!portal.is_active());
        assert!(!portal.process_next());
        assert_eq!(portal.local_addr(), None);
    }

    #[test]
    fn test_answers_any_name_with_ap_address() {
        let mut portal = CaptivePortalResponder::new();
        portal.start(LOCALHOST_ANY_PORT, AP).unwrap();

        for name in ["example.com", "neverssl.com", "www.google.com"] {
            assert_eq!(ask_portal(&mut portal, name), Some(AP), "name {}", name);
        }
        assert_eq!(portal.answered(), 3);
    }

    #[test]
    fn test_idle_poll_returns_false() {
        let mut portal = CaptivePortalResponder::new();
        portal.start(LOCALHOST_ANY_PORT, AP).unwrap();
        assert!(!portal.process_next());
    }

    #[test]
    fn test_garbage_is_ignored() {
        let mut portal = CaptivePortalResponder::new();
        portal.start(LOCALHOST_ANY_PORT, AP).unwrap();
        let client = UdpSocket::bind(LOCALHOST_ANY_PORT).unwrap();
        client
            .send_to(b"hello", portal.local_addr().unwrap())
            .unwrap();

        for _ in 0..50 {
            assert!(!portal.process_next());
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert_eq!(portal.answered(), 0);
    }

    #[test]
    fn test_stop_closes_socket() {
        let mut portal = CaptivePortalResponder::new();
        portal.start(LOCALHOST_ANY_PORT, AP).unwrap();
        portal.stop();
        assert!(!portal.is_active());
        assert!(!portal.process_next());
    }
}
