use crate::clock::{elapsed, ClockTime};
use crate::errors::MetricsResult;
use crate::metrics::{self, format_duration, SleepMetrics, SleepTimes};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One user-reported night.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SleepDiaryEntry {
    pub date: NaiveDate,
    pub bed_time: ClockTime,
    pub fall_asleep_time: ClockTime,
    pub wake_time: ClockTime,
    pub get_up_time: ClockTime,
    #[serde(default)]
    pub awakenings: u32,
    #[serde(default)]
    pub total_awake_time: u32,
    pub sleep_quality: u8,
    pub restedness: u8,
    pub mood: u8,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SleepDiaryEntry {
    pub fn sleep_times(&self) -> SleepTimes {
        SleepTimes {
            bed_time: self.bed_time,
            fall_asleep_time: self.fall_asleep_time,
            wake_time: self.wake_time,
            get_up_time: self.get_up_time,
            total_awake_time: self.total_awake_time,
        }
    }

    pub fn metrics(&self) -> MetricsResult<SleepMetrics> {
        metrics::compute(&self.sleep_times())
    }

    /// Checks the ordinal ratings; clock fields are validated when parsed.
    pub fn validate_ratings(&self) -> Result<(), String> {
        for (name, value) in [
            ("sleep_quality", self.sleep_quality),
            ("restedness", self.restedness),
            ("mood", self.mood),
        ] {
            if !(1..=5).contains(&value) {
                return Err(format!("{name} must be between 1 and 5"));
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, patch: DiaryPatch) {
        if let Some(date) = patch.date {
            self.date = date;
        }
        if let Some(bed_time) = patch.bed_time {
            self.bed_time = bed_time;
        }
        if let Some(fall_asleep_time) = patch.fall_asleep_time {
            self.fall_asleep_time = fall_asleep_time;
        }
        if let Some(wake_time) = patch.wake_time {
            self.wake_time = wake_time;
        }
        if let Some(get_up_time) = patch.get_up_time {
            self.get_up_time = get_up_time;
        }
        if let Some(awakenings) = patch.awakenings {
            self.awakenings = awakenings;
        }
        if let Some(total_awake_time) = patch.total_awake_time {
            self.total_awake_time = total_awake_time;
        }
        if let Some(sleep_quality) = patch.sleep_quality {
            self.sleep_quality = sleep_quality;
        }
        if let Some(restedness) = patch.restedness {
            self.restedness = restedness;
        }
        if let Some(mood) = patch.mood {
            self.mood = mood;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
    }
}

/// Partial update of a stored entry. Absent fields keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiaryPatch {
    pub date: Option<NaiveDate>,
    pub bed_time: Option<ClockTime>,
    pub fall_asleep_time: Option<ClockTime>,
    pub wake_time: Option<ClockTime>,
    pub get_up_time: Option<ClockTime>,
    pub awakenings: Option<u32>,
    pub total_awake_time: Option<u32>,
    pub sleep_quality: Option<u8>,
    pub restedness: Option<u8>,
    pub mood: Option<u8>,
    /// `Some(None)` when the body carries an explicit `null`, which clears the notes.
    #[serde(default, deserialize_with = "present")]
    pub notes: Option<Option<String>>,
}

// Only called for keys present in the body; absent keys fall back to `None`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A persisted entry. Derived metrics are never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryRecord {
    pub id: u64,
    pub user_id: u64,
    #[serde(flatten)]
    pub entry: SleepDiaryEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SleepGoals {
    pub bedtime: ClockTime,
    pub wake_time: ClockTime,
    /// Target hours of sleep.
    pub sleep_duration: f64,
}

impl SleepGoals {
    /// Prescribed bed-to-wake period in minutes.
    pub fn sleep_window(&self) -> u32 {
        elapsed(self.bedtime, self.wake_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppData {
    #[serde(default = "first_id")]
    pub next_id: u64,
    #[serde(default)]
    pub diaries: BTreeMap<u64, DiaryRecord>,
    #[serde(default)]
    pub goals: BTreeMap<u64, SleepGoals>,
}

impl Default for AppData {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            diaries: BTreeMap::new(),
            goals: BTreeMap::new(),
        }
    }
}

fn first_id() -> u64 {
    1
}

impl AppData {
    /// All of a user's records, oldest night first.
    pub fn user_records(&self, user_id: u64) -> Vec<&DiaryRecord> {
        let mut records: Vec<&DiaryRecord> = self
            .diaries
            .values()
            .filter(|record| record.user_id == user_id)
            .collect();
        records.sort_by_key(|record| record.entry.date);
        records
    }

    pub fn find_by_date(&self, user_id: u64, date: NaiveDate) -> Option<&DiaryRecord> {
        self.diaries
            .values()
            .find(|record| record.user_id == user_id && record.entry.date == date)
    }

    pub fn insert(&mut self, user_id: u64, entry: SleepDiaryEntry) -> DiaryRecord {
        let id = self.next_id;
        self.next_id += 1;
        let record = DiaryRecord { id, user_id, entry };
        self.diaries.insert(id, record.clone());
        record
    }

    pub fn record_mut(&mut self, user_id: u64, id: u64) -> Option<&mut DiaryRecord> {
        self.diaries
            .get_mut(&id)
            .filter(|record| record.user_id == user_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct DiaryListQuery {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiaryResponse {
    pub id: u64,
    pub user_id: u64,
    #[serde(flatten)]
    pub entry: SleepDiaryEntry,
    pub time_in_bed: String,
    pub total_sleep_time: String,
    pub sleep_efficiency: u8,
    pub time_in_bed_minutes: u32,
    pub total_sleep_minutes: u32,
    pub sleep_latency_minutes: u32,
    pub time_after_waking_minutes: u32,
}

impl DiaryResponse {
    pub fn new(record: &DiaryRecord, metrics: SleepMetrics) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            entry: record.entry.clone(),
            time_in_bed: format_duration(metrics.time_in_bed),
            total_sleep_time: format_duration(metrics.total_sleep_time),
            sleep_efficiency: metrics.sleep_efficiency,
            time_in_bed_minutes: metrics.time_in_bed,
            total_sleep_minutes: metrics.total_sleep_time,
            sleep_latency_minutes: metrics.sleep_latency,
            time_after_waking_minutes: metrics.time_after_waking,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiaryListResponse {
    pub diaries: Vec<DiaryResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SleepGoalsResponse {
    pub user_id: u64,
    #[serde(flatten)]
    pub goals: SleepGoals,
    pub sleep_window: u32,
    pub sleep_window_display: String,
}

impl SleepGoalsResponse {
    pub fn new(user_id: u64, goals: SleepGoals) -> Self {
        let sleep_window = goals.sleep_window();
        Self {
            user_id,
            goals,
            sleep_window,
            sleep_window_display: format_duration(sleep_window),
        }
    }
}
