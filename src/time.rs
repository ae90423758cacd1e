//! Minutes-after-midnight time encoding.
//!
//! Times are floating point minutes after midnight of the service day. Values
//! outside `[0, 1440)` are valid and expected whenever a trip crosses
//! midnight; callers that need a time-of-day comparison call [`fix_time_range`]
//! explicitly rather than normalizing everywhere.

pub type Minutes = f64;

pub const MINUTES_PER_DAY: Minutes = 1440.0;

/// Reduces `t` to `[0, 1440)` by modular arithmetic. Only used when matching
/// against a time-of-day window (e.g. a fare period); labeling arithmetic
/// itself is done on unreduced, possibly-negative or over-1440 minutes.
pub fn fix_time_range(t: Minutes) -> Minutes {
    let m = t % MINUTES_PER_DAY;
    if m < 0.0 {
        m + MINUTES_PER_DAY
    } else {
        m
    }
}

/// Parses a `HH:MM` or `HH:MM:SS` clock string into minutes after midnight.
/// Hours may exceed 24 to express a next-day time (GTFS convention).
pub fn parse_clock(s: &str) -> Option<Minutes> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = if parts.len() == 3 { parts[2].parse().ok()? } else { 0.0 };
    Some(hours * 60.0 + minutes + seconds / 60.0)
}

pub fn format_clock(t: Minutes) -> String {
    let total_seconds = (t * 60.0).round() as i64;
    let sign = if total_seconds < 0 { "-" } else { "" };
    let total_seconds = total_seconds.unsigned_abs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{sign}{hours:02}:{minutes:02}:{seconds:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_formats_round_trip() {
        let t = parse_clock("08:30:00").unwrap();
        assert_eq!(t, 510.0);
        assert_eq!(format_clock(t), "08:30:00");
    }

    #[test]
    fn crosses_midnight() {
        let t = parse_clock("24:05:00").unwrap();
        assert_eq!(fix_time_range(t), 5.0);
    }

    #[test]
    fn fixes_negative_time() {
        assert_eq!(fix_time_range(-5.0), 1435.0);
    }
}
