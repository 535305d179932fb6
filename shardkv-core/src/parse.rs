//! Size and duration literal parsing ("4KB" -> 4096, "5m" -> 5 min).
//!
//! Grammar: a decimal integer immediately followed by a unit suffix, no
//! internal whitespace. Size units are IEC (1024-based) and case-insensitive.

use crate::error::ParseError;
use std::time::Duration;

/// Splits a literal like `"256KB"` into its numeric prefix and unit suffix.
fn split_literal(literal: &str) -> Option<(&str, &str)> {
    let split_at = literal.find(|c: char| !c.is_ascii_digit())?;
    if split_at == 0 {
        return None;
    }
    Some(literal.split_at(split_at))
}

/// Parses a size literal such as `"4KB"`, `"1MB"`, `"512B"` into a byte count.
///
/// Units are case-insensitive: `B`, `KB`, `MB`, `GB` (powers of 1024).
pub fn parse_size(literal: &str) -> Result<u64, ParseError> {
    let trimmed = literal.trim();
    let (number, unit) =
        split_literal(trimmed).ok_or_else(|| ParseError::InvalidSize(literal.to_string()))?;

    let value: u64 = number
        .parse()
        .map_err(|_| ParseError::InvalidSize(literal.to_string()))?;

    let multiplier: u64 = match unit.to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        other => {
            return Err(ParseError::UnknownSizeUnit {
                literal: literal.to_string(),
                unit: other.to_string(),
            })
        }
    };

    Ok(value * multiplier)
}

/// Parses a duration literal such as `"100ms"`, `"5s"`, `"5m"`, `"2h"`.
pub fn parse_duration(literal: &str) -> Result<Duration, ParseError> {
    let trimmed = literal.trim();
    let (number, unit) =
        split_literal(trimmed).ok_or_else(|| ParseError::InvalidDuration(literal.to_string()))?;

    let value: u64 = number
        .parse()
        .map_err(|_| ParseError::InvalidDuration(literal.to_string()))?;

    let duration = match unit {
        "ns" => Duration::from_nanos(value),
        "us" => Duration::from_micros(value),
        "ms" => Duration::from_millis(value),
        "s" => Duration::from_secs(value),
        "m" => Duration::from_secs(value * 60),
        "h" => Duration::from_secs(value * 3600),
        other => {
            return Err(ParseError::UnknownDurationUnit {
                literal: literal.to_string(),
                unit: other.to_string(),
            })
        }
    };

    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_bytes() {
        assert_eq!(parse_size("512B").unwrap(), 512);
    }

    #[test]
    fn parses_kilobytes_case_insensitive() {
        assert_eq!(parse_size("4KB").unwrap(), 4096);
        assert_eq!(parse_size("4kb").unwrap(), 4096);
        assert_eq!(parse_size("4Kb").unwrap(), 4096);
    }

    #[test]
    fn parses_megabytes_and_gigabytes() {
        assert_eq!(parse_size("2MB").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
    }

    #[test]
    fn rejects_unknown_unit() {
        assert!(matches!(
            parse_size("5TB"),
            Err(ParseError::UnknownSizeUnit { .. })
        ));
    }

    #[test]
    fn rejects_missing_unit() {
        assert!(parse_size("1024").is_err());
    }

    #[test]
    fn parses_duration_minutes() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn parses_duration_milliseconds() {
        assert_eq!(parse_duration("100ms").unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn rejects_unknown_duration_unit() {
        assert!(matches!(
            parse_duration("5y"),
            Err(ParseError::UnknownDurationUnit { .. })
        ));
    }
}
