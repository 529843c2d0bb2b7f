//! TTL string parsing
//!
//! Accepts raw seconds ("86400"), a number with a unit suffix
//! ("30s", "15m", "12h", "7d"), or a named interval ("daily").

use crate::error::{GroundworkError, GroundworkResult};
use std::time::Duration;

const SECS_PER_MINUTE: u64 = 60;
const SECS_PER_HOUR: u64 = 3600;
const SECS_PER_DAY: u64 = 86_400;

/// Parse a TTL string into a duration.
///
/// Zero and negative values are rejected: a cache entry either has a
/// positive TTL or a permanent retention policy, never an instant one.
pub fn parse_ttl(value: &str) -> GroundworkResult<Duration> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err(GroundworkError::invalid_ttl(value, "empty TTL"));
    }

    let keyword_secs = match raw.to_ascii_lowercase().as_str() {
        "minute" => Some(SECS_PER_MINUTE),
        "hourly" => Some(SECS_PER_HOUR),
        "daily" => Some(SECS_PER_DAY),
        "weekly" => Some(7 * SECS_PER_DAY),
        "monthly" => Some(30 * SECS_PER_DAY),
        "yearly" => Some(365 * SECS_PER_DAY),
        _ => None,
    };
    if let Some(secs) = keyword_secs {
        return Ok(Duration::from_secs(secs));
    }

    // Raw integer means seconds.
    if raw.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '+') {
        let secs: i64 = raw
            .parse()
            .map_err(|_| GroundworkError::invalid_ttl(value, "not a valid number of seconds"))?;
        return positive_secs(value, secs);
    }

    // Number with a single-character unit suffix.
    let unit = raw.chars().next_back().unwrap_or_default();
    let amount = &raw[..raw.len() - unit.len_utf8()];
    let multiplier = match unit {
        's' => 1,
        'm' => SECS_PER_MINUTE,
        'h' => SECS_PER_HOUR,
        'd' => SECS_PER_DAY,
        _ => {
            return Err(GroundworkError::invalid_ttl(
                value,
                format!("unknown unit '{unit}', expected s, m, h, or d"),
            ))
        }
    };
    let amount: i64 = amount
        .trim()
        .parse()
        .map_err(|_| GroundworkError::invalid_ttl(value, "not a valid number"))?;
    if amount <= 0 {
        return Err(GroundworkError::invalid_ttl(value, "TTL must be positive"));
    }
    let secs = (amount as u64)
        .checked_mul(multiplier)
        .ok_or_else(|| GroundworkError::invalid_ttl(value, "TTL overflows"))?;
    Ok(Duration::from_secs(secs))
}

fn positive_secs(value: &str, secs: i64) -> GroundworkResult<Duration> {
    if secs <= 0 {
        return Err(GroundworkError::invalid_ttl(value, "TTL must be positive"));
    }
    Ok(Duration::from_secs(secs as u64))
}
