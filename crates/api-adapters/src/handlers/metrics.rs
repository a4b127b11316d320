use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use domains::DomainError;

use crate::error::ApiError;
use crate::metrics;
use crate::state::AppState;

/// `GET /metrics`
pub async fn export(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| DomainError::Internal(format!("metrics encoding: {e}")))?;
    Ok(([(CONTENT_TYPE, metrics::CONTENT_TYPE)], body).into_response())
}
