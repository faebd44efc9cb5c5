use chrono::{DateTime, TimeDelta, Utc};

/// Parse a compact relative duration such as `30s`, `5m`, `2h` or `7d` into
/// milliseconds. Anything else, including the empty string, yields 0 which
/// means "no time filtering".
pub fn parse_duration(token: &str) -> u64 {
    let Some(unit) = token.chars().last() else {
        return 0;
    };
    let digits = &token[..token.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return 0;
    }

    let multiplier: u64 = match unit {
        's' => 1_000,
        'm' => 60_000,
        'h' => 3_600_000,
        'd' => 86_400_000,
        _ => return 0,
    };

    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .unwrap_or(0)
}

/// The length of a relative window, or None when unfiltered
pub fn since_window(token: &str) -> Option<TimeDelta> {
    let millis = parse_duration(token);
    if millis == 0 {
        return None;
    }
    TimeDelta::try_milliseconds(i64::try_from(millis).ok()?)
}

/// `now` minus `window`, clamped to the earliest representable instant
pub fn window_start(window: TimeDelta, now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// The cutoff instant for a relative window, or None when unfiltered
pub fn since_cutoff(token: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    since_window(token).map(|window| window_start(window, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("5m"), 300_000);
        assert_eq!(parse_duration("30s"), 30_000);
        assert_eq!(parse_duration("2h"), 7_200_000);
        assert_eq!(parse_duration("1d"), 86_400_000);
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert_eq!(parse_duration(""), 0);
        assert_eq!(parse_duration("abc"), 0);
        assert_eq!(parse_duration("10x"), 0);
        assert_eq!(parse_duration("m"), 0);
        assert_eq!(parse_duration(" 5m"), 0);
        assert_eq!(parse_duration("5m "), 0);
        assert_eq!(parse_duration("-5m"), 0);
        assert_eq!(parse_duration("1h30m"), 0);
        assert_eq!(parse_duration("99999999999999999999d"), 0);
    }

    #[test]
    fn test_since_cutoff() {
        let now = Utc::now();
        assert_eq!(since_cutoff("", now), None);
        assert_eq!(since_cutoff("10m", now), Some(now - TimeDelta::minutes(10)));
    }
}
