//! Postgres driver over sqlx

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgConnection, PgPool, PgPoolOptions, PgRow};
use sqlx::{Arguments, Column, Either, Executor, Postgres, Row as _, TypeInfo, ValueRef};
use uuid::Uuid;

use super::driver::{BoxCursor, Driver, ExecResult, RowCursor, Session, Statement, TxOptions};
use super::error::{DbError, DbResult};
use super::value::Value;
use crate::config::DatabaseConfig;

pub struct PgDriver {
    pool: PgPool,
}

impl PgDriver {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .max_lifetime(Duration::from_secs(config.connection_max_lifetime_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind(args: &[Value]) -> DbResult<PgArguments> {
    let mut arguments = PgArguments::default();
    for value in args {
        match value {
            // untyped NULL; statements cast the placeholder when the column is not text
            Value::Null => arguments.add(Option::<String>::None),
            Value::Text(s) => arguments.add(s.clone()),
            Value::Integer(i) => arguments.add(*i),
            Value::Timestamp(t) => arguments.add(*t),
            Value::Bytes(b) => arguments.add(b.clone()),
            Value::Unsupported(type_name) => {
                return Err(DbError::Driver(sqlx::Error::Protocol(format!(
                    "cannot bind a scanned {type_name} value"
                ))));
            }
        }
    }
    Ok(arguments)
}

fn acquire_error(e: sqlx::Error) -> DbError {
    match e {
        sqlx::Error::Io(_) => DbError::BadConnection(e),
        other => DbError::Driver(other),
    }
}

fn describe<'q>(sql: &str, stmt: &impl sqlx::Statement<'q, Database = Postgres>) -> Statement {
    let param_count = match stmt.parameters() {
        Some(Either::Left(types)) => types.len(),
        Some(Either::Right(count)) => count,
        None => 0,
    };
    Statement {
        sql: sql.to_string(),
        columns: stmt.columns().iter().map(|c| c.name().to_string()).collect(),
        param_count,
    }
}

fn decode_value(row: &PgRow, index: usize) -> DbResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::Text(row.try_get::<String, _>(index)?),
        "UUID" => Value::Text(row.try_get::<Uuid, _>(index)?.to_string()),
        "INT2" => Value::Integer(row.try_get::<i16, _>(index)?.into()),
        "INT4" => Value::Integer(row.try_get::<i32, _>(index)?.into()),
        "INT8" => Value::Integer(row.try_get::<i64, _>(index)?),
        "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(index)?.and_utc()),
        "BYTEA" => Value::Bytes(row.try_get::<Vec<u8>, _>(index)?),
        // binary wire format; cast the column to text in SQL to read it
        _ => Value::Unsupported(type_name),
    };
    Ok(value)
}

fn decode_row(row: &PgRow) -> DbResult<Vec<Value>> {
    (0..row.len()).map(|index| decode_value(row, index)).collect()
}

/// Streaming result set; column names come from the prepared statement
pub struct PgCursor<'a> {
    columns: Vec<String>,
    rows: BoxStream<'a, Result<PgRow, sqlx::Error>>,
    // failure flag of the transaction the rows are read in
    failed: Option<&'a mut bool>,
}

#[async_trait]
impl<'a> RowCursor for PgCursor<'a> {
    fn columns(&self) -> DbResult<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Option<DbResult<Vec<Value>>> {
        match self.rows.try_next().await {
            Ok(Some(row)) => Some(decode_row(&row)),
            Ok(None) => None,
            Err(e) => {
                if let Some(failed) = self.failed.as_deref_mut() {
                    *failed = true;
                }
                Some(Err(e.into()))
            }
        }
    }
}

#[async_trait]
impl Driver for PgDriver {
    async fn query<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>> {
        let stmt = (&self.pool).prepare(sql).await?;
        let columns = describe(sql, &stmt).columns;
        let rows = sqlx::query_with(sql, bind(args)?).fetch(&self.pool);
        Ok(Box::new(PgCursor {
            columns,
            rows,
            failed: None,
        }))
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let result = sqlx::query_with(sql, bind(args)?).execute(&self.pool).await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
        })
    }

    async fn prepare(&self, sql: &str) -> DbResult<Statement> {
        let stmt = (&self.pool).prepare(sql).await?;
        Ok(describe(sql, &stmt))
    }

    async fn acquire(&self) -> DbResult<Box<dyn Session>> {
        let conn = self.pool.acquire().await.map_err(acquire_error)?;
        Ok(Box::new(PgSession::new(conn)))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// One pooled connection, with the transaction driven by explicit statements.
///
/// `in_tx` is true from the moment `BEGIN` may have reached the server until
/// `COMMIT` or `ROLLBACK` is acknowledged. A session released or dropped in
/// that window closes its connection instead of returning it to the pool.
pub struct PgSession {
    conn: Option<PoolConnection<Postgres>>,
    in_tx: bool,
    // a statement failed inside the open transaction, so the server has aborted it
    failed: bool,
}

fn closed() -> DbError {
    DbError::Driver(sqlx::Error::PoolClosed)
}

impl PgSession {
    fn new(conn: PoolConnection<Postgres>) -> Self {
        Self {
            conn: Some(conn),
            in_tx: false,
            failed: false,
        }
    }

    fn conn(&mut self) -> DbResult<&mut PgConnection> {
        self.conn.as_deref_mut().ok_or_else(closed)
    }

    /// Note a server-side failure inside the transaction
    fn track<T>(&mut self, result: Result<T, sqlx::Error>) -> DbResult<T> {
        if result.is_err() && self.in_tx {
            self.failed = true;
        }
        Ok(result?)
    }

    async fn finish(&mut self, sql: &str) -> DbResult<()> {
        if !self.in_tx {
            return Err(DbError::TxDone);
        }
        self.conn()?.execute(sql).await?;
        self.in_tx = false;
        self.failed = false;
        Ok(())
    }
}

#[async_trait]
impl Session for PgSession {
    async fn query<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>> {
        let arguments = bind(args)?;
        let columns = {
            let prepared = self.conn()?.prepare(sql).await;
            describe(sql, &self.track(prepared)?).columns
        };

        let PgSession { conn, in_tx, failed } = self;
        let conn = conn.as_deref_mut().ok_or_else(closed)?;
        let rows = sqlx::query_with(sql, arguments).fetch(conn);
        Ok(Box::new(PgCursor {
            columns,
            rows,
            failed: (*in_tx).then_some(failed),
        }))
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let arguments = bind(args)?;
        let result = sqlx::query_with(sql, arguments).execute(self.conn()?).await;
        let result = self.track(result)?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
        })
    }

    async fn prepare(&mut self, sql: &str) -> DbResult<Statement> {
        let prepared = self.conn()?.prepare(sql).await;
        Ok(describe(sql, &self.track(prepared)?))
    }

    async fn begin(&mut self, options: &TxOptions) -> DbResult<()> {
        if self.in_tx {
            return Err(DbError::Driver(sqlx::Error::Protocol(
                "transaction already open on this connection".to_string(),
            )));
        }
        let sql = options.begin_sql();

        // a cancelled begin may already have opened the transaction on the server
        self.in_tx = true;
        self.failed = false;
        let begun = match self.conn() {
            Ok(conn) => conn.execute(sql.as_str()).await.map_err(DbError::from),
            Err(e) => Err(e),
        };
        if begun.is_err() {
            self.in_tx = false;
        }
        begun.map(|_| ())
    }

    /// Commit, unless a statement failed since `BEGIN`: the server has then
    /// aborted the transaction, so it is rolled back and `TxAborted` returned.
    async fn commit(&mut self) -> DbResult<()> {
        if self.in_tx && self.failed {
            self.finish("ROLLBACK").await?;
            return Err(DbError::TxAborted);
        }
        self.finish("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.finish("ROLLBACK").await
    }

    async fn release(mut self: Box<Self>) -> DbResult<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if self.in_tx {
            tracing::warn!("Closing connection released with an open transaction");
            conn.close().await?;
        }
        Ok(())
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if self.in_tx {
            if let Some(conn) = self.conn.take() {
                tracing::warn!("Detaching connection dropped with an open transaction");
                drop(conn.detach());
            }
        }
    }
}
