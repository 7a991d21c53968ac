use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::state::SharedState;

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let report = state.health.check(&state).await;
    (report.status_code(), Json(report))
}
