//! Authentication endpoints

use axum::Json;

use crate::{
    error::AppResult,
    models::user::{LoginRequest, LoginResponse},
    services::auth,
};

use super::{ApiJson, UnitOfWork};

/// Exchange a username and password for an API token
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Empty username or password", body = crate::error::ErrorResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    UnitOfWork { mut run, ctx }: UnitOfWork,
    ApiJson(request): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let response = auth::login(&mut run, &ctx, request).await?;
    Ok(Json(response))
}
