//! Database access layer
//!
//! [`Database`] owns the connection pool; each unit of work gets its own
//! [`Runner`] from it and passes a [`Context`] to every call.

use std::sync::Arc;

pub mod context;
pub mod driver;
pub mod error;
pub mod postgres;
pub mod record;
pub mod row;
pub mod runner;
pub mod value;

#[cfg(test)]
pub(crate) mod fake;

pub use context::Context;
pub use driver::{BoxCursor, Driver, ExecResult, IsolationLevel, RowCursor, Session, Statement, TxOptions};
pub use error::{DbError, DbResult, DecodeError};
pub use record::{validate, Record, RecordMapping};
pub use row::{Row, RowReader};
pub use runner::Runner;
pub use value::Value;

use crate::config::DatabaseConfig;
use postgres::PgDriver;

/// Shared handle on the connection pool
#[derive(Clone)]
pub struct Database {
    driver: Arc<dyn Driver>,
}

impl Database {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Open the Postgres pool, apply migrations and check the server settings
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let driver = PgDriver::connect(config).await?;
        tracing::info!("Connected to database");

        sqlx::migrate!("./migrations")
            .run(driver.pool())
            .await
            .map_err(|e| DbError::Driver(e.into()))?;
        tracing::info!("Database migrations completed");

        let db = Self::new(Arc::new(driver));
        db.validate().await?;
        Ok(db)
    }

    /// Timestamps are read back as UTC, so the server must hand them out in UTC
    pub async fn validate(&self) -> DbResult<()> {
        let ctx = Context::background();
        let mut run = self.runner();
        let row = run
            .query_row(&ctx, "SHOW timezone", &[])
            .await?
            .ok_or_else(|| DbError::Misconfigured("SHOW timezone returned no row".to_string()))?;

        let timezone = row.try_read_string(0)?;
        if timezone != "UTC" {
            return Err(DbError::Misconfigured(format!(
                "server timezone is {timezone}, expected UTC"
            )));
        }
        Ok(())
    }

    /// Fresh runner for one unit of work
    pub fn runner(&self) -> Runner {
        Runner::new(self.driver.clone())
    }

    pub async fn close(&self) {
        self.driver.close().await;
        tracing::info!("Database pool closed");
    }
}
