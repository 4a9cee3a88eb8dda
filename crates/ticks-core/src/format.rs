//! Human-readable durations.

use crate::error::EngineError;
use crate::timer::MAX_DURATION_SECS;

/// `m:ss`, or `h:mm:ss` from one hour up.
pub fn format_clock(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = secs / 60 % 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// `m:ss.t` with tenths of a second, for a live countdown.
pub fn format_clock_tenths(ms: u64) -> String {
    let minutes = ms / 60_000;
    let seconds = ms / 1000 % 60;
    let tenths = ms % 1000 / 100;
    format!("{minutes}:{seconds:02}.{tenths}")
}

/// `1h 5m`, `2m 3s` or `7s`.
pub fn format_short(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = secs / 60 % 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Parse a duration in seconds from `90`, `90s`, `5m`, `1h30m`, `1h 30m 10s`,
/// `1:30` or `1:02:03`. Anything over [`MAX_DURATION_SECS`] is rejected.
pub fn parse_duration(input: &str) -> Result<u64, EngineError> {
    let secs = parse_secs(input.trim())?;
    if secs > MAX_DURATION_SECS {
        return Err(EngineError::InvalidArgument(format!(
            "duration '{}' is longer than {MAX_DURATION_SECS}s",
            input.trim()
        )));
    }
    Ok(secs)
}

fn parse_secs(input: &str) -> Result<u64, EngineError> {
    let invalid = || EngineError::InvalidArgument(format!("invalid duration: '{input}'"));
    if input.is_empty() {
        return Err(invalid());
    }

    if input.contains(':') {
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() > 3 {
            return Err(invalid());
        }
        let mut total: u64 = 0;
        for part in parts {
            let value: u64 = part.parse().map_err(|_| invalid())?;
            total = total.checked_mul(60).and_then(|t| t.checked_add(value)).ok_or_else(invalid)?;
        }
        return Ok(total);
    }

    if let Ok(secs) = input.parse::<u64>() {
        return Ok(secs);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in input.chars().filter(|c| !c.is_whitespace()) {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c.to_ascii_lowercase() {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}
