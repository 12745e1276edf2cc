use axum::{Json, extract::State, http::StatusCode};
use sea_orm::ConnectionTrait;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(Serialize, ToSchema)]
pub struct HealthData {
    pub status: String,
    pub database: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "OK", body = ApiResponse<HealthData>),
        (status = 503, description = "Database unreachable", body = ApiResponse<HealthData>),
    ),
        tag = "Health"
)]
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthData>>) {
    let (code, database) = match state.orm.execute_unprepared("SELECT 1").await {
        Ok(_) => (StatusCode::OK, "up"),
        Err(err) => {
            tracing::warn!(error = %err, "health check database ping failed");
            (StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };

    let data = HealthData {
        status: if code.is_success() { "ok" } else { "degraded" }.to_string(),
        database: database.to_string(),
    };

    (
        code,
        Json(ApiResponse::success("Health check", data, Some(Meta::empty()))),
    )
}
