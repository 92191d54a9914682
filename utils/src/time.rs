//! Time formatting helpers.

use std::time::Duration;

/// Human-readable rendering of a duration, e.g. `30m` or `1h 5m`.
/// Zero trailing units are omitted.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (major, major_unit, minor, minor_unit) = if secs < 60 {
        return format!("{secs}s");
    } else if secs < 3600 {
        (secs / 60, "m", secs % 60, "s")
    } else if secs < 86400 {
        (secs / 3600, "h", (secs % 3600) / 60, "m")
    } else {
        (secs / 86400, "d", (secs % 86400) / 3600, "h")
    };
    if minor == 0 {
        format!("{major}{major_unit}")
    } else {
        format!("{major}{major_unit} {minor}{minor_unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ttl_renders_in_minutes() {
        assert_eq!(format_duration(Duration::from_secs(1800)), "30m");
    }

    #[test]
    fn boundaries() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3600)), "1h");
        assert_eq!(format_duration(Duration::from_secs(3900)), "1h 5m");
        assert_eq!(format_duration(Duration::from_secs(90_000)), "1d 1h");
    }
}
