use crate::errors::{MetricsError, MetricsResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// A wall-clock time with no date attached, stored as minutes since midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u32);

impl ClockTime {
    pub fn minutes(self) -> u32 {
        self.0
    }
}

/// Parses a zero-padded 24-hour `HH:MM` string into minutes since midnight.
pub fn to_minutes(hhmm: &str) -> MetricsResult<u32> {
    let invalid = || MetricsError::InvalidTimeFormat(hhmm.to_string());

    let bytes = hhmm.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return Err(invalid());
    }
    let digit = |b: u8| {
        if b.is_ascii_digit() {
            Ok(u32::from(b - b'0'))
        } else {
            Err(invalid())
        }
    };

    let hour = digit(bytes[0])? * 10 + digit(bytes[1])?;
    let minute = digit(bytes[3])? * 10 + digit(bytes[4])?;
    if hour > 23 || minute > 59 {
        return Err(invalid());
    }

    Ok(hour * 60 + minute)
}

/// Projects `end` onto the same continuous timeline as `start`, adding a day
/// when the clock wrapped past midnight.
pub fn normalize(start: ClockTime, end: ClockTime) -> u32 {
    if end.0 < start.0 {
        end.0 + MINUTES_PER_DAY
    } else {
        end.0
    }
}

/// Minutes from `start` to the next occurrence of `end`. Always below a day.
pub fn elapsed(start: ClockTime, end: ClockTime) -> u32 {
    normalize(start, end) - start.0
}

impl FromStr for ClockTime {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        to_minutes(s).map(Self)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> ClockTime {
        s.parse().unwrap()
    }

    #[test]
    fn parses_zero_padded_times() {
        assert_eq!(to_minutes("00:00").unwrap(), 0);
        assert_eq!(to_minutes("07:05").unwrap(), 425);
        assert_eq!(to_minutes("23:59").unwrap(), 1439);
    }

    #[test]
    fn rejects_malformed_times() {
        let inputs = [
            "", "7:05", "07:5", "24:00", "12:60", "ab:cd", "12-30", "12:30:00", " 1:30", "+1:30",
        ];
        for bad in inputs {
            let err = to_minutes(bad).unwrap_err();
            assert_eq!(err, MetricsError::InvalidTimeFormat(bad.to_string()), "input {bad:?}");
        }
    }

    #[test]
    fn normalize_adds_a_day_across_midnight() {
        assert_eq!(normalize(t("23:00"), t("07:00")), 7 * 60 + MINUTES_PER_DAY);
        assert_eq!(normalize(t("01:00"), t("07:00")), 7 * 60);
        assert_eq!(normalize(t("07:00"), t("07:00")), 7 * 60);
    }

    #[test]
    fn elapsed_is_always_within_a_day() {
        assert_eq!(elapsed(t("23:00"), t("07:00")), 480);
        assert_eq!(elapsed(t("22:15"), t("22:45")), 30);
        assert_eq!(elapsed(t("12:00"), t("12:00")), 0);
        assert_eq!(elapsed(t("00:01"), t("00:00")), MINUTES_PER_DAY - 1);
    }

    #[test]
    fn clock_time_serializes_as_string() {
        let value = serde_json::to_value(t("06:45")).unwrap();
        assert_eq!(value, serde_json::json!("06:45"));

        let parsed: ClockTime = serde_json::from_str("\"22:30\"").unwrap();
        assert_eq!(parsed.minutes(), 1350);
        assert!(serde_json::from_str::<ClockTime>("\"25:00\"").is_err());
    }
}
