//! Minimal DNS wire handling for the captive portal.
//!
//! Only what a wildcard responder needs: read the first question of a
//! query and answer it with one A record.

use std::net::Ipv4Addr;

/// DNS header length.
pub const HEADER_LEN: usize = 12;

/// Classic UDP DNS message size limit.
pub const MAX_MESSAGE_LEN: usize = 512;

/// TTL of the answers, short so clients re-resolve after leaving the portal.
pub const ANSWER_TTL_SECS: u32 = 60;

const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;

/// The first question of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    /// Length of the encoded question section (name + type + class).
    pub len: usize,
    pub qtype: u16,
    pub qclass: u16,
    /// Dotted name, for logging.
    pub name: heapless::String<253>,
}

/// Parse the header and first question of a query.
///
/// Returns `None` for responses, packets without a question, compressed or
/// truncated names, and anything else this responder will not answer.
pub fn parse_question(packet: &[u8]) -> Option<DnsQuestion> {
    if packet.len() < HEADER_LEN {
        return None;
    }
    // QR bit set: this is a response, not a query
    if packet[2] & 0x80 != 0 {
        return None;
    }
    let qdcount = u16::from_be_bytes([packet[4], packet[5]]);
    if qdcount == 0 {
        return None;
    }

    let mut idx = HEADER_LEN;
    let mut name = heapless::String::<253>::new();

    loop {
        let label_len = *packet.get(idx)? as usize;
        idx += 1;
        if label_len == 0 {
            break;
        }
        // Compression pointers never appear in a query's first name
        if label_len & 0xC0 != 0 || idx + label_len > packet.len() {
            return None;
        }
        // The name is only logged; every query gets the same answer, so
        // odd bytes and overlong names are kept as far as they fit
        let label = String::from_utf8_lossy(&packet[idx..idx + label_len]);
        if !name.is_empty() {
            let _ = name.push('.');
        }
        for c in label.chars() {
            if name.push(c).is_err() {
                break;
            }
        }
        idx += label_len;
    }

    if idx + 4 > packet.len() {
        return None;
    }
    let qtype = u16::from_be_bytes([packet[idx], packet[idx + 1]]);
    let qclass = u16::from_be_bytes([packet[idx + 2], packet[idx + 3]]);
    idx += 4;

    Some(DnsQuestion {
        len: idx - HEADER_LEN,
        qtype,
        qclass,
        name,
    })
}

/// Write a response to `query` into `response`, answering `question` with
/// `answer` as an A record. Returns the response length.
pub fn build_answer(
    query: &[u8],
    question: &DnsQuestion,
    answer: Ipv4Addr,
    response: &mut [u8],
) -> Option<usize> {
    let question_end = HEADER_LEN + question.len;
    let total = question_end + 16;
    if query.len() < question_end || response.len() < total {
        return None;
    }

    response[..total].fill(0);
    // ID
    response[0..2].copy_from_slice(&query[0..2]);
    // QR=1, opcode 0, RD copied from the query; RA=1, RCODE 0
    response[2] = 0x80 | (query[2] & 0x01);
    response[3] = 0x80;
    // One question, one answer, no authority or additional records
    response[4..6].copy_from_slice(&1u16.to_be_bytes());
    response[6..8].copy_from_slice(&1u16.to_be_bytes());

    response[HEADER_LEN..question_end].copy_from_slice(&query[HEADER_LEN..question_end]);

    let a = question_end;
    // Name: pointer to the question name at offset 12
    response[a] = 0xC0;
    response[a + 1] = HEADER_LEN as u8;
    response[a + 2..a + 4].copy_from_slice(&TYPE_A.to_be_bytes());
    response[a + 4..a + 6].copy_from_slice(&CLASS_IN.to_be_bytes());
    response[a + 6..a + 10].copy_from_slice(&ANSWER_TTL_SECS.to_be_bytes());
    response[a + 10..a + 12].copy_from_slice(&4u16.to_be_bytes());
    response[a + 12..a + 16].copy_from_slice(&answer.octets());

    Some(total)
}

/// Encode a standard recursive query for `name` (used by tests and the
/// host simulator's self-check).
pub fn encode_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + name.len() + 6);
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // RD
    packet.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    packet.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);
    packet.extend_from_slice(&qtype.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());
    packet
}

/// Pull the address out of an A-record answer built by [`build_answer`].
pub fn answer_address(response: &[u8]) -> Option<Ipv4Addr> {
    let question = parse_response_question_len(response)?;
    let rdata = HEADER_LEN + question + 12;
    let octets: [u8; 4] = response.get(rdata..rdata + 4)?.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

fn parse_response_question_len(response: &[u8]) -> Option<usize> {
    if response.len() < HEADER_LEN || response[2] & 0x80 == 0 {
        return None;
    }
    let mut idx = HEADER_LEN;
    loop {
        let len = *response.get(idx)? as usize;
        idx += 1;
        if len == 0 {
            break;
        }
        idx += len;
    }
    Some(idx + 4 - HEADER_LEN)
}
