//! Duration strings in timeout syntax ("30m", "1h30m", "45s")

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("empty duration")]
    Empty,

    #[error("invalid duration '{0}': expected a number followed by h, m or s")]
    Invalid(String),

    #[error("duration '{0}' is too large")]
    Overflow(String),
}

/// Parse a duration such as `"1h30m"` into a [`Duration`]
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(DurationError::Empty);
    }

    let mut total: u64 = 0;
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let multiplier = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(DurationError::Invalid(input.to_string())),
        };
        if digits.is_empty() {
            return Err(DurationError::Invalid(input.to_string()));
        }

        let amount: u64 = digits
            .parse()
            .map_err(|_| DurationError::Overflow(input.to_string()))?;
        total = amount
            .checked_mul(multiplier)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        digits.clear();
    }

    // Trailing number without a unit
    if !digits.is_empty() {
        return Err(DurationError::Invalid(input.to_string()));
    }

    Ok(Duration::from_secs(total))
}

/// Format a duration the way [`parse_duration`] accepts it
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 {
        out.push_str(&format!("{}s", s));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_single_units() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn parse_combined_units() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(" 1m5s ").unwrap(), Duration::from_secs(65));
    }

    #[test]
    fn parse_rejects_malformed_input() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert!(matches!(parse_duration("10"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("m"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_duration("5d"), Err(DurationError::Invalid(_))));
        assert!(matches!(
            parse_duration("99999999999999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }

    #[test]
    fn format_round_trips() {
        assert_eq!(format_duration(Duration::from_secs(5400)), "1h30m");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m1s");
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }
}
