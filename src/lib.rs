//! Bookstore catalogue server
//!
//! A REST JSON API over a Postgres book catalogue, built on a small
//! transactional query runner ([`db::Runner`]) and a by-name row mapper.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: db::Database,
}
