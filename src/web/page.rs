//! Configuration page and status rendering.

use crate::state::{ConfigSnapshot, MAX_SERVO_ANGLE};
use serde::Serialize;
use std::collections::TryReserveError;
use std::fmt::Write;
use std::time::Duration;

/// Fixed markup around the dynamic values, rounded up.
const PAGE_OVERHEAD: usize = 2048;

/// Worst-case growth of HTML escaping (`"` becomes `&quot;`).
const ESCAPE_FACTOR: usize = 6;

/// Escape text for element content and quoted attribute values.
pub fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

/// Render the configuration page with the staged values pre-filled.
///
/// The whole buffer is reserved up front so a tight heap shows up as an
/// error here instead of an abort halfway through formatting.
pub fn render_page(snapshot: &ConfigSnapshot) -> Result<String, TryReserveError> {
    let dynamic = snapshot.display_text.len() + snapshot.ssid.len();
    let mut page = String::new();
    page.try_reserve(PAGE_OVERHEAD + dynamic * ESCAPE_FACTOR)?;

    page.push_str(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
         <title>Marquee</title></head><body>\n<h1>Marquee</h1>\n",
    );

    let _ = write!(page, "<p>Network: {}", snapshot.connectivity);
    if let Some(ip) = snapshot.station_ip {
        let _ = write!(page, " ({})", ip);
    }
    page.push_str("</p>\n");

    page.push_str(
        "<form method=\"post\" action=\"/\">\n<h2>Display</h2>\n\
         <label>Text<br><textarea name=\"data\" rows=\"4\" cols=\"40\" maxlength=\"1023\">",
    );
    escape_html(&snapshot.display_text, &mut page);
    let _ = write!(
        page,
        "</textarea></label><br>\n\
         <label>Servo angle <input type=\"number\" name=\"servo_angle\" min=\"0\" max=\"{}\" value=\"{}\"></label><br>\n\
         <input type=\"submit\" value=\"Update display\">\n</form>\n",
        MAX_SERVO_ANGLE, snapshot.servo_angle
    );

    page.push_str(
        "<form method=\"post\" action=\"/\">\n<h2>WiFi</h2>\n\
         <label>SSID <input type=\"text\" name=\"ssid\" maxlength=\"32\" value=\"",
    );
    escape_html(&snapshot.ssid, &mut page);
    page.push_str(
        "\"></label><br>\n\
         <label>Password <input type=\"password\" name=\"password\" maxlength=\"63\"></label><br>\n\
         <input type=\"submit\" value=\"Save and reconnect\">\n</form>\n</body></html>\n",
    );

    Ok(page)
}

/// `/status` body.
#[derive(Debug, Serialize)]
pub struct StatusReport<'a> {
    pub state: &'static str,
    pub station_ip: Option<String>,
    pub auto_reconnect: bool,
    pub ssid: &'a str,
    pub display_text: &'a str,
    pub servo_angle: u8,
    pub uptime_secs: u64,
}

impl<'a> StatusReport<'a> {
    pub fn new(snapshot: &'a ConfigSnapshot, uptime: Duration) -> Self {
        Self {
            state: snapshot.connectivity.as_str(),
            station_ip: snapshot.station_ip.map(|ip| ip.to_string()),
            auto_reconnect: snapshot.auto_reconnect,
            ssid: &snapshot.ssid,
            display_text: &snapshot.display_text,
            servo_angle: snapshot.servo_angle,
            uptime_secs: uptime.as_secs(),
        }
    }
}
