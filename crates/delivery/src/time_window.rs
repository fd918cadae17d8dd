//! Time-of-day windows for `time_based` campaigns.
//!
//! Windows are expressed as local `HH:MM` strings and compared in
//! minutes-since-midnight. A window whose start is after its end wraps past
//! midnight (22:00 to 06:00).

use tracing::debug;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Parse `HH:MM` (a trailing `:SS` is tolerated and ignored) into minutes
/// since midnight.
pub fn parse_minutes(value: &str) -> Option<u32> {
    let mut parts = value.trim().split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    if let Some(seconds) = parts.next() {
        seconds.trim().parse::<u32>().ok().filter(|s| *s < 60)?;
    }
    if parts.next().is_some() || hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Inclusive on both ends. For wrapping windows the current minute must not
/// fall in the exclusive gap `(end, start)`.
pub fn in_window(start: u32, end: u32, current: u32) -> bool {
    if start <= end {
        current >= start && current <= end
    } else {
        !(current > end && current < start)
    }
}

/// Window check for a campaign's optional bounds. Missing or unparseable
/// bounds disable the filter.
pub fn campaign_in_window(start: Option<&str>, end: Option<&str>, current: u32) -> bool {
    match (start.and_then(parse_minutes), end.and_then(parse_minutes)) {
        (Some(start), Some(end)) => in_window(start, end, current),
        (None, None) if start.is_none() && end.is_none() => true,
        _ => {
            debug!(start = ?start, end = ?end, "Incomplete or malformed time window ignored");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minutes() {
        assert_eq!(parse_minutes("00:00"), Some(0));
        assert_eq!(parse_minutes("22:30"), Some(1350));
        assert_eq!(parse_minutes("9:05"), Some(545));
        assert_eq!(parse_minutes("23:59:59"), Some(1439));
        assert_eq!(parse_minutes("24:00"), None);
        assert_eq!(parse_minutes("12:60"), None);
        assert_eq!(parse_minutes("noon"), None);
        assert_eq!(parse_minutes(""), None);
    }

    #[test]
    fn test_normal_window_inclusive() {
        let (start, end) = (9 * 60, 17 * 60);
        assert!(in_window(start, end, start));
        assert!(in_window(start, end, end));
        assert!(in_window(start, end, 12 * 60));
        assert!(!in_window(start, end, 8 * 60 + 59));
        assert!(!in_window(start, end, 17 * 60 + 1));
    }

    #[test]
    fn test_wrapping_window() {
        let (start, end) = (22 * 60, 6 * 60);
        assert!(in_window(start, end, 23 * 60 + 30));
        assert!(in_window(start, end, 2 * 60));
        assert!(in_window(start, end, 22 * 60));
        assert!(in_window(start, end, 6 * 60));
        assert!(!in_window(start, end, 12 * 60));
        assert!(!in_window(start, end, 6 * 60 + 1));
    }

    #[test]
    fn test_missing_bounds_always_in_window() {
        assert!(campaign_in_window(None, Some("06:00"), 12 * 60));
        assert!(campaign_in_window(Some("bogus"), Some("06:00"), 12 * 60));
        assert!(!campaign_in_window(Some("22:00"), Some("06:00"), 12 * 60));
    }
}
