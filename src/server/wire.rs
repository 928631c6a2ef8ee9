//! Line formatting for server → client traffic.

use chrono::NaiveDateTime;

/// Timestamp prefix format: `YYYYMMDD HH:MM:SS.microseconds`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d %H:%M:%S%.6f";

/// Format one outgoing line: `[{timestamp}] [{sender} ]{message}\n`.
///
/// Always ends with exactly one newline.
pub fn format_line(timestamp: NaiveDateTime, message: &str, sender: Option<&str>) -> String {
    let stamp = timestamp.format(TIMESTAMP_FORMAT);
    let message = message.trim_end_matches(['\r', '\n']);
    match sender {
        Some(sender) => format!("[{stamp}] {sender} {message}\n"),
        None => format!("[{stamp}] {message}\n"),
    }
}

/// Greeting sent to a freshly accepted connection.
pub fn welcome(username: &str) -> String {
    format!("Welcome! Your username is {username}")
}
