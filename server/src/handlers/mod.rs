pub mod dashboard;
pub mod patients;
pub mod records;
pub mod specimens;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::models::ApiError;
use crate::AppState;

pub use dashboard::dashboard_stats;

/// Health check endpoint, 503 when the database does not answer
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "version": env!("CARGO_PKG_VERSION")
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unreachable"
                })),
            )
        }
    }
}

/// Unknown routes answer with the error envelope
pub async fn fallback() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
