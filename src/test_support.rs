//! Helpers shared by the unit tests.

use crate::portal::{dns, CaptivePortalResponder};
use crate::state::SharedConfigState;
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::thread;
use std::time::Duration;

/// Loopback, OS-assigned port.
pub const LOCALHOST_ANY_PORT: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));

/// Send one A query for `name` to `server` from a fresh client socket.
pub fn send_portal_query(server: SocketAddr, name: &str) -> Option<UdpSocket> {
    let client = UdpSocket::bind(LOCALHOST_ANY_PORT).ok()?;
    client.set_read_timeout(Some(Duration::from_secs(2))).ok()?;
    client.send_to(&dns::encode_query(0x4242, name, 1), server).ok()?;
    Some(client)
}

/// Wait for the reply to a query sent with [`send_portal_query`].
pub fn read_portal_answer(client: &UdpSocket) -> Option<Ipv4Addr> {
    let mut buf = [0u8; dns::MAX_MESSAGE_LEN];
    let (len, _) = client.recv_from(&mut buf).ok()?;
    dns::answer_address(&buf[..len])
}

/// Send one A query for `name` to an active portal, let it answer, and return
/// the address in the reply.
pub fn ask_portal(portal: &mut CaptivePortalResponder, name: &str) -> Option<Ipv4Addr> {
    let client = send_portal_query(portal.local_addr()?, name)?;

    // The datagram may take a moment to land on the non-blocking socket
    let mut answered = false;
    for _ in 0..500 {
        if portal.process_next() {
            answered = true;
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    if !answered {
        return None;
    }
    read_portal_answer(&client)
}

/// Form fields from literal pairs.
pub fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Observed value of every pending flag, for whole-set comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSet {
    pub credentials_changed: bool,
    pub restart_requested: bool,
    pub display_changed: bool,
    pub handle_captive_dns: bool,
    pub auto_reconnect_enabled: bool,
}

impl FlagSet {
    pub fn of(state: &SharedConfigState) -> Self {
        let flags = &state.flags;
        Self {
            credentials_changed: flags.credentials_changed.is_raised(),
            restart_requested: flags.restart_requested.is_raised(),
            display_changed: flags.display_changed.is_raised(),
            handle_captive_dns: flags.handle_captive_dns.is_raised(),
            auto_reconnect_enabled: flags.auto_reconnect_enabled.is_raised(),
        }
    }
}
