//! Health check endpoint

use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

use super::UnitOfWork;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current status of the service
    pub status: String,
    /// Version of the service
    pub version: String,
}

/// Reports healthy once the database answers a trivial query
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Database unreachable", body = crate::error::ErrorResponse)
    )
)]
pub async fn health_check(UnitOfWork { mut run, ctx }: UnitOfWork) -> AppResult<Json<HealthResponse>> {
    run.query_row(&ctx, "SELECT 1", &[])
        .await
        .map_err(AppError::database("Database unreachable"))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}
