//! Store seam consumed by the runner
//!
//! A [`Driver`] is the connection pool; a [`Session`] is one physical
//! connection checked out of it, possibly holding an open transaction.

use async_trait::async_trait;

use super::error::DbResult;
use super::value::Value;

/// Cursor over a result set, pulled one row at a time
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RowCursor: Send {
    /// Column names, in result order
    fn columns(&self) -> DbResult<Vec<String>>;

    /// Next row, `None` when the result set is exhausted
    async fn next_row(&mut self) -> Option<DbResult<Vec<Value>>>;
}

pub type BoxCursor<'a> = Box<dyn RowCursor + 'a>;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options applied when a transaction is begun
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOptions {
    /// `None` keeps the server default
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TxOptions {
    pub fn read_only() -> Self {
        Self {
            isolation: None,
            read_only: true,
        }
    }

    pub fn with_isolation(isolation: IsolationLevel) -> Self {
        Self {
            isolation: Some(isolation),
            read_only: false,
        }
    }

    /// `BEGIN` statement carrying these options
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(isolation) = self.isolation {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(isolation.as_sql());
        }
        if self.read_only {
            sql.push_str(" READ ONLY");
        }
        sql
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: u64,
}

/// Description of a prepared statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub columns: Vec<String>,
    pub param_count: usize,
}

/// Connection pool
#[async_trait]
pub trait Driver: Send + Sync {
    async fn query<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>>;

    async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult>;

    async fn prepare(&self, sql: &str) -> DbResult<Statement>;

    /// Check out one physical connection
    async fn acquire(&self) -> DbResult<Box<dyn Session>>;

    /// Check out a connection and begin a transaction on it
    async fn begin(&self, options: &TxOptions) -> DbResult<Box<dyn Session>> {
        let mut session = self.acquire().await?;
        match session.begin(options).await {
            Ok(()) => Ok(session),
            Err(e) => {
                // The begin failure wins; the connection is discarded either way
                let _ = session.release().await;
                Err(e)
            }
        }
    }

    /// Close every connection; later acquisitions fail
    async fn close(&self) {}
}

/// One physical connection checked out of a [`Driver`]
#[async_trait]
pub trait Session: Send {
    async fn query<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>>;

    async fn execute(&mut self, sql: &str, args: &[Value]) -> DbResult<ExecResult>;

    async fn prepare(&mut self, sql: &str) -> DbResult<Statement>;

    async fn begin(&mut self, options: &TxOptions) -> DbResult<()>;

    /// Fails with `TxDone` when no transaction is open
    async fn commit(&mut self) -> DbResult<()>;

    /// Fails with `TxDone` when no transaction is open
    async fn rollback(&mut self) -> DbResult<()>;

    /// Give the connection back to its pool
    async fn release(self: Box<Self>) -> DbResult<()>;
}
