//! Per-unit-of-work statement runner
//!
//! A [`Runner`] decides which executor receives each statement: the active
//! transaction, else the pinned connection, else the pool. Transactions nest
//! by reference counting on a single physical transaction; only the outermost
//! [`Runner::transact`] commits, and any failure rolls the whole thing back.
//!
//! A runner is owned by exactly one unit of work and is never shared between
//! concurrent tasks.

use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::context::Context;
use super::driver::{BoxCursor, Driver, ExecResult, Session, Statement, TxOptions};
use super::error::{DbError, DbResult};
use super::row::{Row, RowReader};
use super::value::Value;

enum TxHandle {
    /// Transaction on a session checked out for it alone
    Owned(Box<dyn Session>),
    /// Transaction running on the pinned connection
    OnPinned,
}

enum Target<'a> {
    Pool(&'a dyn Driver),
    Session(&'a mut Box<dyn Session>),
}

impl<'a> Target<'a> {
    async fn query(self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>> {
        match self {
            Target::Pool(db) => db.query(sql, args).await,
            Target::Session(session) => session.query(sql, args).await,
        }
    }

    async fn execute(self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        match self {
            Target::Pool(db) => db.execute(sql, args).await,
            Target::Session(session) => session.execute(sql, args).await,
        }
    }

    async fn prepare(self, sql: &str) -> DbResult<Statement> {
        match self {
            Target::Pool(db) => db.prepare(sql).await,
            Target::Session(session) => session.prepare(sql).await,
        }
    }
}

pub struct Runner {
    db: Arc<dyn Driver>,
    conn: Option<Box<dyn Session>>,
    tx: Option<TxHandle>,
    tx_count: usize,
    // transact calls currently on the stack, including ones unwinding after a rollback
    frames: usize,
    // set when a nested frame rolled back while enclosing frames are still running
    aborted: bool,
}

impl Runner {
    pub fn new(db: Arc<dyn Driver>) -> Self {
        Self {
            db,
            conn: None,
            tx: None,
            tx_count: 0,
            frames: 0,
            aborted: false,
        }
    }

    /// True while at least one `transact` call holds the transaction
    pub fn is_in_transaction(&self) -> bool {
        self.tx_count > 0
    }

    /// True while a connection is pinned by `conn`
    pub fn is_pinned(&self) -> bool {
        self.conn.is_some()
    }

    fn target(&mut self) -> DbResult<Target<'_>> {
        if self.aborted {
            return Err(DbError::TxDone);
        }
        match (&mut self.tx, &mut self.conn) {
            (Some(TxHandle::Owned(session)), _) => Ok(Target::Session(session)),
            (Some(TxHandle::OnPinned), Some(session)) | (None, Some(session)) => {
                Ok(Target::Session(session))
            }
            (Some(TxHandle::OnPinned), None) => Err(DbError::TxDone),
            (None, None) => Ok(Target::Pool(self.db.as_ref())),
        }
    }

    pub async fn query<'a>(
        &'a mut self,
        ctx: &Context,
        sql: &'a str,
        args: &'a [Value],
    ) -> DbResult<RowReader<'a>> {
        let target = self.target()?;
        let cursor = ctx.run(target.query(sql, args)).await?;
        RowReader::new(cursor, ctx.clone())
    }

    /// First row of the result, `None` when it is empty
    pub async fn query_row(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<Option<Row>> {
        let mut reader = self.query(ctx, sql, args).await?;
        if reader.advance().await {
            return Ok(reader.take_row());
        }
        reader.finish()?;
        Ok(None)
    }

    pub async fn exec(&mut self, ctx: &Context, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let target = self.target()?;
        ctx.run(target.execute(sql, args)).await
    }

    pub async fn prepare(&mut self, ctx: &Context, sql: &str) -> DbResult<Statement> {
        let target = self.target()?;
        ctx.run(target.prepare(sql)).await
    }

    /// Run `body` atomically with respect to every statement it issues through this runner.
    ///
    /// The first (outermost) call begins a transaction with `options`; nested
    /// calls ignore `options` and share it. Only the outermost successful exit
    /// commits. An error or panic at any depth rolls back at once, and the
    /// enclosing calls then observe no active transaction: their statements
    /// and any new `transact` fail with [`DbError::TxDone`], and an enclosing
    /// body that still returns `Ok` gets `TxDone` as well.
    ///
    /// Rollback failures are logged, never returned: the caller always sees
    /// the error (or panic) that caused the rollback.
    pub async fn transact<T, E, F>(&mut self, ctx: &Context, options: TxOptions, body: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut Runner, &'r Context) -> BoxFuture<'r, Result<T, E>>,
        E: From<DbError>,
    {
        if self.aborted {
            return Err(DbError::TxDone.into());
        }

        if self.tx.is_none() {
            let handle = match self.conn.as_mut() {
                Some(conn) => {
                    ctx.run(conn.begin(&options)).await?;
                    TxHandle::OnPinned
                }
                None => TxHandle::Owned(ctx.run(self.db.begin(&options)).await?),
            };
            tracing::debug!("Transaction started ({:?})", options);
            self.tx = Some(handle);
            self.tx_count = 1;
        } else {
            self.tx_count += 1;
        }
        self.frames += 1;

        let outcome = AssertUnwindSafe(body(&mut *self, ctx)).catch_unwind().await;

        let result = match outcome {
            Ok(Ok(value)) => self.complete(ctx).await.map(|()| value).map_err(E::from),
            Ok(Err(e)) => {
                self.rollback(ctx).await;
                Err(e)
            }
            Err(panic) => {
                self.rollback(ctx).await;
                self.leave_frame();
                resume_unwind(panic)
            }
        };
        self.leave_frame();
        result
    }

    /// Pin one physical connection for the duration of `body`.
    ///
    /// Delegates straight to `body` when a transaction or a pinned connection
    /// is already active. Otherwise acquires a connection (retrying once on a
    /// bad connection) and releases it exactly once when `body` finishes. A
    /// release failure replaces `body`'s result.
    pub async fn conn<T, E, F>(&mut self, ctx: &Context, body: F) -> Result<T, E>
    where
        F: for<'r> FnOnce(&'r mut Runner, &'r Context) -> BoxFuture<'r, Result<T, E>>,
        E: From<DbError>,
    {
        if self.aborted {
            return Err(DbError::TxDone.into());
        }
        if self.tx.is_some() || self.conn.is_some() {
            return body(self, ctx).await;
        }

        let session = match ctx.run(self.db.acquire()).await {
            Err(DbError::BadConnection(e)) => {
                tracing::debug!("Bad connection on acquire, retrying: {}", e);
                ctx.run(self.db.acquire()).await?
            }
            other => other?,
        };
        self.conn = Some(session);

        let outcome = AssertUnwindSafe(body(&mut *self, ctx)).catch_unwind().await;

        let released = match self.conn.take() {
            Some(session) => session.release().await,
            None => Ok(()),
        };

        match (outcome, released) {
            (Err(panic), released) => {
                if let Err(e) = released {
                    tracing::warn!("Failed to release connection: {}", e);
                }
                resume_unwind(panic)
            }
            (Ok(_), Err(e)) => Err(e.into()),
            (Ok(result), Ok(())) => result,
        }
    }

    /// Exit of a frame whose body succeeded
    async fn complete(&mut self, ctx: &Context) -> DbResult<()> {
        if self.tx.is_none() {
            // a nested frame rolled back and this body carried on regardless
            return Err(DbError::TxDone);
        }

        self.tx_count -= 1;
        if self.tx_count > 0 {
            return Ok(());
        }

        let result = match self.tx.take() {
            Some(TxHandle::Owned(mut session)) => {
                let committed = ctx.run(session.commit()).await;
                if let Err(e) = session.release().await {
                    tracing::warn!("Failed to release transaction connection: {}", e);
                }
                committed
            }
            Some(TxHandle::OnPinned) => match self.conn.as_mut() {
                Some(conn) => ctx.run(conn.commit()).await,
                None => Err(DbError::TxDone),
            },
            None => Err(DbError::TxDone),
        };

        match result {
            Ok(()) => {
                tracing::debug!("Transaction committed");
                Ok(())
            }
            // finalized underneath us, most likely because the context ended first
            Err(DbError::TxDone) => Err(ctx.err().unwrap_or(DbError::TxDone)),
            Err(e) => Err(e),
        }
    }

    /// Roll back whatever transaction is active and reset the nesting state
    async fn rollback(&mut self, ctx: &Context) {
        let handle = self.tx.take();
        self.tx_count = 0;
        if handle.is_none() {
            return;
        }
        if self.frames > 1 {
            self.aborted = true;
        }

        let result = match handle {
            Some(TxHandle::Owned(mut session)) => {
                let rolled_back = ctx.run(session.rollback()).await;
                if let Err(e) = session.release().await {
                    tracing::warn!("Failed to release transaction connection: {}", e);
                }
                rolled_back
            }
            // the pinned session stays in use afterwards, so its rollback cannot be abandoned
            Some(TxHandle::OnPinned) => match self.conn.as_mut() {
                Some(conn) => conn.rollback().await,
                None => Ok(()),
            },
            None => Ok(()),
        };

        match result {
            Ok(()) => tracing::debug!("Transaction rolled back"),
            Err(e) => tracing::warn!("Rollback failed: {}", e),
        }
    }

    fn leave_frame(&mut self) {
        self.frames -= 1;
        if self.frames == 0 {
            self.aborted = false;
        }
    }
}
