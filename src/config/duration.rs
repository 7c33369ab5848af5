//! Duration parsing utilities.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Parse a duration string like "1h", "2m", "1s", "500ms" or "3" into a
/// [`Duration`].
/// Supports:
/// - Plain numbers (interpreted as seconds): "3"
/// - Milliseconds suffix: "500ms"
/// - Seconds suffix: "1s", "0.5s"
/// - Minutes suffix: "2m"
/// - Hours suffix: "1h"
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::Config("Empty duration string".to_string()));
    }

    // "ms" before "m" and "s"
    if let Some(num_str) = s.strip_suffix("ms") {
        return parse_number(num_str, "milliseconds").map(Duration::from_millis);
    }
    if let Some(num_str) = s.strip_suffix('h') {
        return parse_number(num_str, "hours").map(|h| Duration::from_secs(h * 3600));
    }
    if let Some(num_str) = s.strip_suffix('m') {
        return parse_number(num_str, "minutes").map(|m| Duration::from_secs(m * 60));
    }
    let secs = s.strip_suffix('s').unwrap_or(s);
    let value: f64 = secs
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid duration value: {s}")))?;
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("Invalid duration value: {s}")))
}

fn parse_number(num_str: &str, unit: &str) -> Result<u64> {
    num_str
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid {unit} value: {num_str}")))
}

/// `deserialize_with` helper for duration strings in config files.
pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}
