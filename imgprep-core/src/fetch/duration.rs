//! Compact, fixed-width duration strings for download ETAs.

/// Returned for durations longer than two days.
pub const UNKNOWN: &str = "unknown";

/// Format a number of seconds using the two coarsest units that fit.
///
/// | range          | example  |
/// |----------------|----------|
/// | under a minute | `   07s` |
/// | under an hour  | `03'07s` |
/// | under a day    | `02h03'` |
/// | up to 48 hours | ` 1d02h` |
///
/// Everything but [`UNKNOWN`] is six characters wide, right-justified.
pub fn format_duration(secs: u64) -> String {
    let s = format!("{:02}s", secs % 60);
    if secs < 60 {
        return format!("{s:>6}");
    }

    let mins = secs / 60;
    let m = format!("{:02}'", mins % 60);
    if mins < 60 {
        return format!("{m}{s}");
    }

    let hours = mins / 60;
    let h = format!("{:02}h", hours % 24);
    if hours < 24 {
        return format!("{h}{m}");
    }
    if hours > 2 * 24 {
        return UNKNOWN.to_string();
    }

    let d = format!("{}d", hours / 24);
    format!("{:>6}", format!("{d}{h}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    /// Coarseness of the units a formatted string uses.
    fn width_class(formatted: &str) -> u8 {
        if formatted == UNKNOWN {
            4
        } else if formatted.contains('d') {
            3
        } else if formatted.ends_with('\'') {
            2
        } else if formatted.contains('\'') {
            1
        } else {
            0
        }
    }

    #[test]
    fn test_seconds_only() {
        assert_eq!(format_duration(0), "   00s");
        assert_eq!(format_duration(7), "   07s");
        assert_eq!(format_duration(59), "   59s");
    }

    #[test]
    fn test_minutes_and_seconds() {
        assert_eq!(format_duration(60), "01'00s");
        assert_eq!(format_duration(187), "03'07s");
        assert_eq!(format_duration(3599), "59'59s");
    }

    #[test]
    fn test_hours_and_minutes() {
        assert_eq!(format_duration(3600), "01h00'");
        assert_eq!(format_duration(2 * 3600 + 3 * 60 + 9), "02h03'");
        assert_eq!(format_duration(24 * 3600 - 1), "23h59'");
    }

    #[test]
    fn test_days_and_hours() {
        assert_eq!(format_duration(24 * 3600), " 1d00h");
        assert_eq!(format_duration(26 * 3600 + 59), " 1d02h");
        assert_eq!(format_duration(48 * 3600), " 2d00h");
        assert_eq!(format_duration(48 * 3600 + 3599), " 2d00h");
    }

    #[test]
    fn test_beyond_two_days_is_unknown() {
        assert_eq!(format_duration(49 * 3600), UNKNOWN);
        assert_eq!(format_duration(u64::MAX), UNKNOWN);
    }

    proptest! {
        #[test]
        fn width_is_fixed_below_sentinel(secs in 0u64..(49 * 3600)) {
            prop_assert_eq!(format_duration(secs).len(), 6);
        }

        #[test]
        fn seconds_digits_match_remainder(secs in 0u64..3600) {
            let out = format_duration(secs);
            let expected = format!("{:02}", secs % 60);
            prop_assert_eq!(&out[3..5], expected.as_str());
            prop_assert!(out.ends_with('s'));
        }

        #[test]
        fn width_class_is_monotonic(a in 0u64..400_000, b in 0u64..400_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(width_class(&format_duration(lo)) <= width_class(&format_duration(hi)));
        }
    }
}
