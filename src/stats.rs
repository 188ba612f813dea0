use crate::metrics::{format_duration, SleepMetrics};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Derived metrics of one stored night, the unit every aggregate works on.
#[derive(Debug, Clone, Copy)]
pub struct NightMetrics {
    pub date: NaiveDate,
    pub sleep_quality: u8,
    pub metrics: SleepMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiaryAverages {
    pub avg_sleep_time: String,
    pub avg_sleep_quality: f64,
    pub avg_efficiency: u32,
    pub nights_counted: usize,
}

impl DiaryAverages {
    pub fn empty() -> Self {
        Self {
            avg_sleep_time: "N/A".to_string(),
            avg_sleep_quality: 0.0,
            avg_efficiency: 0,
            nights_counted: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricChange {
    pub before: f64,
    pub after: f64,
    /// Signed percentage where positive always means the patient improved.
    /// `None` when the baseline average is zero.
    pub change_pct: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Improvement {
    pub window: usize,
    pub sleep_time: MetricChange,
    pub efficiency: MetricChange,
    pub fall_asleep_time: MetricChange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Week,
    Month,
    #[default]
    All,
}

impl TimeRange {
    fn night_limit(self) -> Option<usize> {
        match self {
            TimeRange::Week => Some(7),
            TimeRange::Month => Some(30),
            TimeRange::All => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NightPoint {
    pub date: String,
    pub total_sleep_minutes: u32,
    pub time_in_bed_minutes: u32,
    pub sleep_efficiency: u8,
    pub sleep_quality: u8,
    pub sleep_latency_minutes: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyAveragePoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub nights_counted: u8,
    pub avg_efficiency: f64,
    pub avg_sleep_minutes: f64,
    pub avg_quality: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressReport {
    pub range: TimeRange,
    pub averages: DiaryAverages,
    pub nights: Vec<NightPoint>,
    pub weekly_averages: Vec<WeeklyAveragePoint>,
    pub improvement: Option<Improvement>,
}

pub fn averages(nights: &[NightMetrics]) -> DiaryAverages {
    if nights.is_empty() {
        return DiaryAverages::empty();
    }

    let avg_sleep = mean(nights, |n| f64::from(n.metrics.total_sleep_time));
    let avg_quality = mean(nights, |n| f64::from(n.sleep_quality));
    let avg_efficiency = mean(nights, |n| f64::from(n.metrics.sleep_efficiency));

    DiaryAverages {
        avg_sleep_time: format_duration(avg_sleep.round() as u32),
        avg_sleep_quality: round1(avg_quality),
        avg_efficiency: avg_efficiency.round() as u32,
        nights_counted: nights.len(),
    }
}

/// Compares the first `window` nights against the last `window` nights.
///
/// The two windows overlap when fewer than `2 * window` nights exist. Returns
/// `None` below two nights.
pub fn improvement(nights: &[NightMetrics], window: usize) -> Option<Improvement> {
    if nights.len() < 2 || window == 0 {
        return None;
    }

    let take = window.min(nights.len());
    let first = &nights[..take];
    let last = &nights[nights.len() - take..];

    let sleep_time = |n: &NightMetrics| f64::from(n.metrics.total_sleep_time);
    let efficiency = |n: &NightMetrics| f64::from(n.metrics.sleep_efficiency);
    let latency = |n: &NightMetrics| f64::from(n.metrics.sleep_latency);

    Some(Improvement {
        window: take,
        sleep_time: higher_is_better(mean(first, sleep_time), mean(last, sleep_time)),
        efficiency: higher_is_better(mean(first, efficiency), mean(last, efficiency)),
        fall_asleep_time: lower_is_better(mean(first, latency), mean(last, latency)),
    })
}

fn higher_is_better(before: f64, after: f64) -> MetricChange {
    let change_pct = (before != 0.0).then(|| round1((after - before) / before * 100.0));
    MetricChange {
        before: round1(before),
        after: round1(after),
        change_pct,
    }
}

// A drop in the raw value is reported as a positive change.
fn lower_is_better(before: f64, after: f64) -> MetricChange {
    let change_pct = (before != 0.0).then(|| round1((before - after) / before * 100.0));
    MetricChange {
        before: round1(before),
        after: round1(after),
        change_pct,
    }
}

/// `nights` must be ordered oldest first.
pub fn progress(nights: &[NightMetrics], range: TimeRange, window: usize) -> ProgressReport {
    let shown = match range.night_limit() {
        Some(limit) if nights.len() > limit => &nights[nights.len() - limit..],
        _ => nights,
    };

    let points = shown
        .iter()
        .map(|night| NightPoint {
            date: night.date.to_string(),
            total_sleep_minutes: night.metrics.total_sleep_time,
            time_in_bed_minutes: night.metrics.time_in_bed,
            sleep_efficiency: night.metrics.sleep_efficiency,
            sleep_quality: night.sleep_quality,
            sleep_latency_minutes: night.metrics.sleep_latency,
        })
        .collect();

    ProgressReport {
        range,
        averages: averages(shown),
        nights: points,
        weekly_averages: weekly_averages(shown),
        improvement: improvement(nights, window),
    }
}

fn weekly_averages(nights: &[NightMetrics]) -> Vec<WeeklyAveragePoint> {
    let mut weeks: BTreeMap<NaiveDate, Vec<NightMetrics>> = BTreeMap::new();
    for night in nights {
        weeks.entry(week_start(night.date)).or_default().push(*night);
    }

    weeks
        .into_iter()
        .map(|(start, week)| WeeklyAveragePoint {
            week: week_label(start),
            start_date: start.to_string(),
            end_date: (start + Duration::days(6)).to_string(),
            nights_counted: week.len() as u8,
            avg_efficiency: round1(mean(&week, |n| f64::from(n.metrics.sleep_efficiency))),
            avg_sleep_minutes: round1(mean(&week, |n| f64::from(n.metrics.total_sleep_time))),
            avg_quality: round1(mean(&week, |n| f64::from(n.sleep_quality))),
        })
        .collect()
}

fn mean(nights: &[NightMetrics], value: impl Fn(&NightMetrics) -> f64) -> f64 {
    if nights.is_empty() {
        return 0.0;
    }
    nights.iter().map(value).sum::<f64>() / nights.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn night(day: u32, tst: u32, efficiency: u8, quality: u8, latency: u32) -> NightMetrics {
        NightMetrics {
            date: NaiveDate::from_ymd_opt(2023, 3, day).unwrap(),
            sleep_quality: quality,
            metrics: SleepMetrics {
                time_in_bed: 480,
                total_sleep_time: tst,
                sleep_efficiency: efficiency,
                sleep_latency: latency,
                time_after_waking: 15,
            },
        }
    }

    #[test]
    fn averages_of_empty_diary_is_no_data() {
        let result = averages(&[]);
        assert_eq!(result, DiaryAverages::empty());
        assert_eq!(result.avg_sleep_time, "N/A");
        assert_eq!(result.avg_sleep_quality, 0.0);
        assert_eq!(result.avg_efficiency, 0);
    }

    #[test]
    fn averages_over_diary_nights() {
        let nights = [
            night(27, 385, 83, 3, 45),
            night(28, 435, 94, 5, 15),
            night(29, 365, 72, 2, 30),
            night(30, 435, 85, 4, 30),
            night(31, 440, 84, 3, 30),
        ];
        let result = averages(&nights);

        // 2060 / 5 = 412
        assert_eq!(result.avg_sleep_time, "6h 52m");
        assert_eq!(result.avg_sleep_quality, 3.4);
        // 418 / 5 = 83.6
        assert_eq!(result.avg_efficiency, 84);
        assert_eq!(result.nights_counted, 5);
    }

    #[test]
    fn improvement_needs_two_nights() {
        assert!(improvement(&[], 7).is_none());
        assert!(improvement(&[night(1, 400, 80, 3, 20)], 7).is_none());
    }

    #[test]
    fn faster_sleep_onset_is_positive_improvement() {
        let mut nights = Vec::new();
        for day in 1..=7 {
            nights.push(night(day, 360, 70, 3, 30));
        }
        for day in 8..=14 {
            nights.push(night(day, 420, 91, 4, 15));
        }

        let result = improvement(&nights, 7).unwrap();
        assert_eq!(result.window, 7);

        assert_eq!(result.fall_asleep_time.before, 30.0);
        assert_eq!(result.fall_asleep_time.after, 15.0);
        assert_eq!(result.fall_asleep_time.change_pct, Some(50.0));

        assert_eq!(result.sleep_time.change_pct, Some(16.7));
        assert_eq!(result.efficiency.change_pct, Some(30.0));
    }

    #[test]
    fn slower_sleep_onset_is_negative_improvement() {
        let nights = [night(1, 400, 80, 3, 20), night(2, 400, 80, 3, 30)];
        let result = improvement(&nights, 1).unwrap();
        assert_eq!(result.fall_asleep_time.change_pct, Some(-50.0));
        assert_eq!(result.sleep_time.change_pct, Some(0.0));
    }

    #[test]
    fn zero_baseline_has_no_change() {
        let nights = [night(1, 400, 80, 3, 0), night(2, 400, 80, 3, 10)];
        let result = improvement(&nights, 1).unwrap();
        assert_eq!(result.fall_asleep_time.change_pct, None);
    }

    #[test]
    fn windows_overlap_on_short_history() {
        let nights = [
            night(1, 300, 60, 3, 40),
            night(2, 360, 70, 3, 30),
            night(3, 420, 80, 3, 20),
        ];
        let result = improvement(&nights, 7).unwrap();
        assert_eq!(result.window, 3);
        assert_eq!(result.sleep_time.before, result.sleep_time.after);
        assert_eq!(result.sleep_time.change_pct, Some(0.0));
    }

    #[test]
    fn progress_week_range_keeps_last_seven_nights() {
        let nights: Vec<NightMetrics> = (1..=14).map(|day| night(day, 400, 80, 3, 20)).collect();
        let report = progress(&nights, TimeRange::Week, 7);

        assert_eq!(report.nights.len(), 7);
        assert_eq!(report.nights[0].date, "2023-03-08");
        assert_eq!(report.averages.nights_counted, 7);
        assert!(report.improvement.is_some());
    }

    #[test]
    fn progress_groups_nights_by_iso_week() {
        // 2023-03-05 is a Sunday, 2023-03-06 a Monday
        let nights = [
            night(4, 400, 80, 3, 20),
            night(5, 420, 90, 4, 10),
            night(6, 360, 70, 2, 30),
        ];
        let report = progress(&nights, TimeRange::All, 7);

        assert_eq!(report.weekly_averages.len(), 2);
        let first = &report.weekly_averages[0];
        assert_eq!(first.week, "2023-W09");
        assert_eq!(first.start_date, "2023-02-27");
        assert_eq!(first.end_date, "2023-03-05");
        assert_eq!(first.nights_counted, 2);
        assert_eq!(first.avg_efficiency, 85.0);
        assert_eq!(first.avg_quality, 3.5);

        let second = &report.weekly_averages[1];
        assert_eq!(second.week, "2023-W10");
        assert_eq!(second.nights_counted, 1);
    }

    #[test]
    fn time_range_parses_lowercase() {
        let range: TimeRange = serde_json::from_str("\"month\"").unwrap();
        assert_eq!(range, TimeRange::Month);
        assert_eq!(TimeRange::default(), TimeRange::All);
    }
}
