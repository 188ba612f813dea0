use crate::errors::AppError;
use crate::extract::{Json, Path, Query};
use crate::metrics::SleepMetrics;
use crate::models::{
    AppData, DiaryListQuery, DiaryListResponse, DiaryPatch, DiaryRecord, DiaryResponse,
    SleepDiaryEntry, SleepGoals, SleepGoalsResponse,
};
use crate::state::AppState;
use crate::stats::{self, DiaryAverages, NightMetrics, ProgressReport, TimeRange};
use crate::storage::persist_data;
use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::MutexGuard;
use tracing::{info, warn};

type JsonResponse<T> = axum::Json<T>;

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub range: Option<TimeRange>,
}

pub async fn health() -> JsonResponse<Value> {
    axum::Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn create_entry(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(entry): Json<SleepDiaryEntry>,
) -> Result<(StatusCode, JsonResponse<DiaryResponse>), AppError> {
    let metrics = checked_metrics(user_id, &entry)?;

    let mut data = state.data.lock().await;
    if data.find_by_date(user_id, entry.date).is_some() {
        return Err(duplicate_date());
    }

    let mut next = data.clone();
    let record = next.insert(user_id, entry);
    commit(&state, &mut data, next).await?;
    info!(user_id, diary_id = record.id, date = %record.entry.date, "diary entry created");

    let response = DiaryResponse::new(&record, metrics);
    Ok((StatusCode::CREATED, axum::Json(response)))
}

pub async fn list_entries(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Query(query): Query<DiaryListQuery>,
) -> Result<JsonResponse<DiaryListResponse>, AppError> {
    let limit = query.limit.unwrap_or(state.config.page_limit);
    let skip = query.skip.unwrap_or(0);

    let data = state.data.lock().await;
    let diaries = data
        .user_records(user_id)
        .into_iter()
        .rev()
        .skip(skip)
        .take(limit)
        .map(to_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(axum::Json(DiaryListResponse { diaries }))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path((user_id, diary_id)): Path<(u64, u64)>,
) -> Result<JsonResponse<DiaryResponse>, AppError> {
    let data = state.data.lock().await;
    let record = data
        .diaries
        .get(&diary_id)
        .filter(|record| record.user_id == user_id)
        .ok_or_else(entry_not_found)?;

    Ok(axum::Json(to_response(record)?))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path((user_id, diary_id)): Path<(u64, u64)>,
    Json(patch): Json<DiaryPatch>,
) -> Result<JsonResponse<DiaryResponse>, AppError> {
    let mut data = state.data.lock().await;
    let mut next = data.clone();
    let record = next.record_mut(user_id, diary_id).ok_or_else(entry_not_found)?;

    record.entry.apply(patch);
    let metrics = checked_metrics(user_id, &record.entry)?;
    let response = DiaryResponse::new(record, metrics);

    if let Some(other) = next.find_by_date(user_id, response.entry.date) {
        if other.id != diary_id {
            return Err(duplicate_date());
        }
    }

    commit(&state, &mut data, next).await?;
    Ok(axum::Json(response))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path((user_id, diary_id)): Path<(u64, u64)>,
) -> Result<StatusCode, AppError> {
    let mut data = state.data.lock().await;
    if data.record_mut(user_id, diary_id).is_none() {
        return Err(entry_not_found());
    }

    let mut next = data.clone();
    next.diaries.remove(&diary_id);
    commit(&state, &mut data, next).await?;
    info!(user_id, diary_id, "diary entry deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_summary(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<JsonResponse<DiaryAverages>, AppError> {
    let data = state.data.lock().await;
    let nights = user_nights(&data, user_id)?;
    Ok(axum::Json(stats::averages(&nights)))
}

pub async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Query(query): Query<ProgressQuery>,
) -> Result<JsonResponse<ProgressReport>, AppError> {
    let data = state.data.lock().await;
    let nights = user_nights(&data, user_id)?;
    let range = query.range.unwrap_or_default();
    let report = stats::progress(&nights, range, state.config.improvement_window);
    Ok(axum::Json(report))
}

pub async fn get_goals(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
) -> Result<JsonResponse<SleepGoalsResponse>, AppError> {
    let data = state.data.lock().await;
    let goals = data
        .goals
        .get(&user_id)
        .cloned()
        .ok_or_else(|| AppError::not_found("Sleep goals not set"))?;
    Ok(axum::Json(SleepGoalsResponse::new(user_id, goals)))
}

pub async fn put_goals(
    State(state): State<AppState>,
    Path(user_id): Path<u64>,
    Json(goals): Json<SleepGoals>,
) -> Result<JsonResponse<SleepGoalsResponse>, AppError> {
    if !(goals.sleep_duration > 0.0 && goals.sleep_duration <= 24.0) {
        return Err(AppError::unprocessable("sleep_duration must be between 0 and 24 hours"));
    }

    let mut data = state.data.lock().await;
    let mut next = data.clone();
    next.goals.insert(user_id, goals.clone());
    commit(&state, &mut data, next).await?;
    info!(user_id, sleep_window = goals.sleep_window(), "sleep goals updated");

    Ok(axum::Json(SleepGoalsResponse::new(user_id, goals)))
}

/// Writes `next` to disk and only then makes it the live state.
async fn commit(
    state: &AppState,
    data: &mut MutexGuard<'_, AppData>,
    next: AppData,
) -> Result<(), AppError> {
    persist_data(&state.config.data_path, &next).await?;
    **data = next;
    Ok(())
}

fn checked_metrics(user_id: u64, entry: &SleepDiaryEntry) -> Result<SleepMetrics, AppError> {
    entry.validate_ratings().map_err(AppError::unprocessable)?;
    entry.metrics().map_err(|err| {
        warn!(user_id, date = %entry.date, error = %err, "rejected diary entry");
        AppError::from(err)
    })
}

fn to_response(record: &DiaryRecord) -> Result<DiaryResponse, AppError> {
    let metrics = record.entry.metrics()?;
    Ok(DiaryResponse::new(record, metrics))
}

fn user_nights(data: &AppData, user_id: u64) -> Result<Vec<NightMetrics>, AppError> {
    data.user_records(user_id)
        .into_iter()
        .map(|record| -> Result<NightMetrics, AppError> {
            Ok(NightMetrics {
                date: record.entry.date,
                sleep_quality: record.entry.sleep_quality,
                metrics: record.entry.metrics()?,
            })
        })
        .collect()
}

fn duplicate_date() -> AppError {
    AppError::bad_request("A sleep diary entry already exists for this date")
}

fn entry_not_found() -> AppError {
    AppError::not_found("Sleep diary entry not found")
}
