//! API handlers for the bookstore REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{
    db::{Context, Runner},
    error::AppError,
    AppState,
};

/// Database handle for one request: a fresh runner and the request's deadline
pub struct UnitOfWork {
    pub run: Runner,
    pub ctx: Context,
}

#[async_trait]
impl FromRequestParts<AppState> for UnitOfWork {
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(UnitOfWork {
            run: state.db.runner(),
            ctx: Context::background().with_timeout(state.config.server.request_timeout()),
        })
    }
}

/// Token sent as `Authorization: Bearer <token>`
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::NotAuthenticated("Missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::NotAuthenticated("Invalid authorization header format".to_string()))?;

        Ok(BearerToken(token.trim().to_string()))
    }
}

/// JSON body whose rejection renders as an `InvalidJsonBody` error
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
