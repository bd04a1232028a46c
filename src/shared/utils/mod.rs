use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Render a stored UTC timestamp in a display timezone. Storage stays UTC;
/// this is a pure function of the value and the zone.
pub fn format_local(at: DateTime<Utc>, tz: &Tz) -> String {
    at.with_timezone(tz).to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_local_shifts_zone_not_instant() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let utc = format_local(at, &chrono_tz::UTC);
        let berlin = format_local(at, &chrono_tz::Europe::Berlin);

        assert_eq!(utc, "2026-03-01T12:00:00+00:00");
        assert_eq!(berlin, "2026-03-01T13:00:00+01:00");

        // Same instant either way.
        let back = DateTime::parse_from_rfc3339(&berlin).unwrap();
        assert_eq!(back.with_timezone(&Utc), at);
    }
}
