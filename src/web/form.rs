//! `application/x-www-form-urlencoded` decoding.

use crate::state::DISPLAY_TEXT_CAPACITY;
use std::collections::HashMap;
use std::io::{self, Read};

/// Longest encoded name or value kept per field. A full display text still
/// fits when every byte of it arrives percent-encoded; the rest of an
/// oversized value is skipped without dropping the fields after it.
pub const MAX_FIELD_LEN: usize = 3 * (DISPLAY_TEXT_CAPACITY + 1);

/// Read chunk size.
const CHUNK_LEN: usize = 512;

/// Decode a form body into field name → value.
///
/// A repeated field keeps its last value. Pairs without `=` get an empty
/// value. Malformed escapes are kept literally.
pub fn parse_form(body: &str) -> HashMap<String, String> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(name), decode_component(value))
        })
        .collect()
}

/// Decode a form body from a stream.
///
/// Memory stays bounded by [`MAX_FIELD_LEN`] per field however long the
/// body is: each name and value is cut at that many encoded bytes.
pub fn read_form<R: Read>(mut reader: R) -> io::Result<HashMap<String, String>> {
    let mut fields = HashMap::new();
    let mut name = Vec::new();
    let mut value = Vec::new();
    let mut in_value = false;
    let mut chunk = [0u8; CHUNK_LEN];

    loop {
        let len = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for &byte in &chunk[..len] {
            match byte {
                b'&' => {
                    finish_pair(&mut fields, &mut name, &mut value);
                    in_value = false;
                }
                b'=' if !in_value => in_value = true,
                _ => {
                    let field = if in_value { &mut value } else { &mut name };
                    if field.len() < MAX_FIELD_LEN {
                        field.push(byte);
                    }
                }
            }
        }
    }
    finish_pair(&mut fields, &mut name, &mut value);
    Ok(fields)
}

fn finish_pair(fields: &mut HashMap<String, String>, name: &mut Vec<u8>, value: &mut Vec<u8>) {
    if !name.is_empty() || !value.is_empty() {
        fields.insert(decode_bytes(name), decode_bytes(value));
    }
    name.clear();
    value.clear();
}

/// Percent-decode one name or value, with `+` as space.
pub fn decode_component(raw: &str) -> String {
    decode_bytes(raw.as_bytes())
}

fn decode_bytes(bytes: &[u8]) -> String {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    match byte? {
        b @ b'0'..=b'9' => Some(b - b'0'),
        b @ b'a'..=b'f' => Some(b - b'a' + 10),
        b @ b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
