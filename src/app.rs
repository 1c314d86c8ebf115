use crate::handlers;
use crate::state::AppState;
use axum::{Router, routing::get};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/summary", get(handlers::get_summary))
        .route("/api/range", get(handlers::get_range))
        .with_state(state)
}
