use crate::handlers;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route(
            "/api/sleep-diary/:user_id",
            get(handlers::list_entries).post(handlers::create_entry),
        )
        .route("/api/sleep-diary/:user_id/summary", get(handlers::get_summary))
        .route("/api/sleep-diary/:user_id/progress", get(handlers::get_progress))
        .route(
            "/api/sleep-diary/:user_id/:diary_id",
            get(handlers::get_entry)
                .put(handlers::update_entry)
                .delete(handlers::delete_entry),
        )
        .route(
            "/api/users/:user_id/sleep-goals",
            get(handlers::get_goals).put(handlers::put_goals),
        )
        .with_state(state)
}
