//! Derived sleep metrics for a single night.
//!
//! Every value here is recomputed from the four reported clock times and the
//! minutes spent awake; nothing is cached.

use crate::clock::{elapsed, normalize, ClockTime};
use crate::errors::{MetricsError, MetricsResult};
use serde::{Deserialize, Serialize};

/// The raw inputs of one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepTimes {
    pub bed_time: ClockTime,
    pub fall_asleep_time: ClockTime,
    pub wake_time: ClockTime,
    pub get_up_time: ClockTime,
    pub total_awake_time: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepMetrics {
    pub time_in_bed: u32,
    pub total_sleep_time: u32,
    pub sleep_efficiency: u8,
    pub sleep_latency: u32,
    pub time_after_waking: u32,
}

pub fn time_in_bed(times: &SleepTimes) -> u32 {
    elapsed(times.bed_time, times.get_up_time)
}

pub fn total_sleep_time(times: &SleepTimes) -> MetricsResult<u32> {
    let window = i64::from(normalize(times.fall_asleep_time, times.wake_time))
        - i64::from(times.fall_asleep_time.minutes());
    let asleep = window - i64::from(times.total_awake_time);

    u32::try_from(asleep).map_err(|_| {
        MetricsError::InconsistentWindow(format!(
            "{} minutes awake exceeds the {window} minute sleep window",
            times.total_awake_time
        ))
    })
}

/// Rounded percentage of time in bed spent asleep.
pub fn sleep_efficiency(total_sleep_time: u32, time_in_bed: u32) -> MetricsResult<u8> {
    if time_in_bed == 0 {
        return Err(MetricsError::ZeroTimeInBed);
    }
    if total_sleep_time > time_in_bed {
        return Err(MetricsError::InconsistentWindow(format!(
            "{total_sleep_time} minutes asleep exceeds {time_in_bed} minutes in bed"
        )));
    }

    // round half up in integer arithmetic
    let tst = u64::from(total_sleep_time);
    let tib = u64::from(time_in_bed);
    let pct = (200 * tst + tib) / (2 * tib);
    Ok(pct as u8)
}

pub fn compute(times: &SleepTimes) -> MetricsResult<SleepMetrics> {
    let tib = time_in_bed(times);
    let tst = total_sleep_time(times)?;
    let efficiency = sleep_efficiency(tst, tib)?;

    Ok(SleepMetrics {
        time_in_bed: tib,
        total_sleep_time: tst,
        sleep_efficiency: efficiency,
        sleep_latency: elapsed(times.bed_time, times.fall_asleep_time),
        time_after_waking: elapsed(times.wake_time, times.get_up_time),
    })
}

/// Renders a minute count as `Xh Ym`.
pub fn format_duration(minutes: u32) -> String {
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(bed: &str, asleep: &str, wake: &str, up: &str, awake: u32) -> SleepTimes {
        SleepTimes {
            bed_time: bed.parse().unwrap(),
            fall_asleep_time: asleep.parse().unwrap(),
            wake_time: wake.parse().unwrap(),
            get_up_time: up.parse().unwrap(),
            total_awake_time: awake,
        }
    }

    #[test]
    fn time_in_bed_crosses_midnight() {
        let night = times("23:00", "23:30", "06:30", "07:00", 0);
        assert_eq!(format_duration(time_in_bed(&night)), "8h 0m");
    }

    #[test]
    fn computes_a_typical_night() {
        let night = times("22:30", "23:00", "06:45", "07:15", 25);
        let metrics = compute(&night).unwrap();

        assert_eq!(format_duration(metrics.time_in_bed), "8h 45m");
        assert_eq!(metrics.total_sleep_time, 440);
        assert_eq!(format_duration(metrics.total_sleep_time), "7h 20m");
        assert_eq!(metrics.sleep_efficiency, 84);
        assert_eq!(metrics.sleep_latency, 30);
        assert_eq!(metrics.time_after_waking, 30);
    }

    #[test]
    fn zero_awake_time_is_the_raw_window() {
        let night = times("22:45", "23:00", "06:15", "06:30", 0);
        let metrics = compute(&night).unwrap();
        assert_eq!(metrics.total_sleep_time, 7 * 60 + 15);
        assert_eq!(metrics.sleep_efficiency, 94);
    }

    #[test]
    fn fall_asleep_exactly_at_midnight() {
        let night = times("23:15", "00:00", "06:45", "07:00", 20);
        let metrics = compute(&night).unwrap();
        assert_eq!(metrics.time_in_bed, 465);
        assert_eq!(metrics.total_sleep_time, 385);
        assert_eq!(metrics.sleep_latency, 45);
        assert_eq!(metrics.sleep_efficiency, 83);
    }

    #[test]
    fn awake_time_longer_than_window_is_inconsistent() {
        let night = times("23:00", "23:30", "00:30", "07:00", 90);
        assert!(matches!(
            total_sleep_time(&night),
            Err(MetricsError::InconsistentWindow(_))
        ));
        assert!(matches!(compute(&night), Err(MetricsError::InconsistentWindow(_))));
    }

    #[test]
    fn sleep_longer_than_time_in_bed_is_inconsistent() {
        // asleep before getting into bed
        let night = times("23:00", "22:00", "07:00", "07:00", 0);
        assert!(matches!(compute(&night), Err(MetricsError::InconsistentWindow(_))));
    }

    #[test]
    fn zero_time_in_bed_is_reported() {
        let night = times("23:00", "23:00", "23:00", "23:00", 0);
        assert_eq!(compute(&night), Err(MetricsError::ZeroTimeInBed));
        assert_eq!(sleep_efficiency(0, 0), Err(MetricsError::ZeroTimeInBed));
    }

    #[test]
    fn efficiency_rounds_half_up() {
        assert_eq!(sleep_efficiency(1, 8).unwrap(), 13); // 12.5
        assert_eq!(sleep_efficiency(465, 525).unwrap(), 89); // 88.57
        assert_eq!(sleep_efficiency(480, 480).unwrap(), 100);
        assert_eq!(sleep_efficiency(0, 480).unwrap(), 0);
    }

    #[test]
    fn recomputing_is_idempotent() {
        let night = times("22:15", "22:45", "06:30", "06:45", 40);
        assert_eq!(compute(&night).unwrap(), compute(&night).unwrap());
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0), "0h 0m");
        assert_eq!(format_duration(365), "6h 5m");
        assert_eq!(format_duration(1439), "23h 59m");
    }
}
