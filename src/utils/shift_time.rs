use derive_more::Display;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Returned when a string is not a zero-padded 24-hour `HH:mm` time.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display(fmt = "invalid time `{}`, expected HH:mm", _0)]
pub struct InvalidTime(pub String);

impl std::error::Error for InvalidTime {}

/// `^\d{2}:\d{2}$` with hours 00-23 and minutes 00-59.
pub fn is_valid_time(time: &str) -> bool {
    time_to_minutes(time).is_ok()
}

/// Parses `HH:mm` into minutes since midnight (0..=1439).
pub fn time_to_minutes(time: &str) -> Result<u32, InvalidTime> {
    let invalid = || InvalidTime(time.to_string());

    let (hours, minutes) = time.split_once(':').ok_or_else(invalid)?;
    if hours.len() != 2 || minutes.len() != 2 {
        return Err(invalid());
    }
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    Ok(hours * 60 + minutes)
}

/// Formats minutes since midnight as zero-padded `HH:mm`.
///
/// Values past the end of the day are not wrapped: 1500 renders as `25:00`,
/// which is what a late boundary past midnight looks like.
pub fn minutes_to_time(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// The `HH:mm` after which a check-in counts as late.
pub fn late_boundary(start_time: &str, tolerance_minutes: u32) -> Result<String, InvalidTime> {
    let start = time_to_minutes(start_time)?;
    Ok(minutes_to_time(start.saturating_add(tolerance_minutes)))
}

/// Current wall-clock minute formatted the way shifts store times.
pub fn format_clock(time: chrono::NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn parses_zero_padded_times() {
        assert_eq!(time_to_minutes("00:00"), Ok(0));
        assert_eq!(time_to_minutes("08:30"), Ok(510));
        assert_eq!(time_to_minutes("23:59"), Ok(1439));
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["8:30", "08:3", "0830", "24:00", "12:60", "ab:cd", "", "08:30:00", "+1:30"] {
            assert!(time_to_minutes(bad).is_err(), "{bad} should be rejected");
            assert!(!is_valid_time(bad));
        }
    }

    #[test]
    fn every_minute_of_the_day_survives_formatting() {
        for m in 0..MINUTES_PER_DAY {
            let text = minutes_to_time(m);
            assert_eq!(time_to_minutes(&text), Ok(m));
        }
    }

    #[test]
    fn late_boundary_adds_tolerance() {
        assert_eq!(late_boundary("08:00", 30).as_deref(), Ok("08:30"));
        assert_eq!(late_boundary("08:45", 30).as_deref(), Ok("09:15"));
        assert_eq!(late_boundary("23:50", 30).as_deref(), Ok("24:20"));
    }

    #[test]
    fn late_boundary_never_wraps_before_start() {
        let boundary = late_boundary("08:00", u32::MAX).unwrap();
        assert!(time_to_minutes(&boundary).is_err());
        assert_ne!(boundary, "07:59");
        assert_eq!(boundary, minutes_to_time(u32::MAX));
    }

    #[test]
    fn clock_is_truncated_to_the_minute() {
        let t = NaiveTime::from_hms_opt(7, 5, 59).unwrap();
        assert_eq!(format_clock(t), "07:05");
    }

    #[test]
    fn error_names_the_input() {
        let err = time_to_minutes("25:00").unwrap_err();
        assert_eq!(err.to_string(), "invalid time `25:00`, expected HH:mm");
    }
}
