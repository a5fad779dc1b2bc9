//! In-memory driver recording every call, for runner and repository tests

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::context::Context;
use super::driver::{BoxCursor, Driver, ExecResult, RowCursor, Session, Statement, TxOptions};
use super::error::{DbError, DbResult};
use super::value::Value;

/// Executor a statement was sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum On {
    Pool,
    Session(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Acquire,
    Begin(u32, TxOptions),
    Commit(u32),
    Rollback(u32),
    Release(u32),
    Exec(On, String),
    Query(On, String),
    Prepare(On, String),
}

struct Script {
    fragment: String,
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    rows_affected: u64,
}

#[derive(Default)]
struct State {
    next_id: u32,
    events: Vec<Event>,
    statements: Vec<(String, Vec<Value>)>,
    scripts: Vec<Script>,
    committed: Vec<String>,
    bad_connections: usize,
    fail_begin: bool,
    fail_rollback: bool,
    fail_release: bool,
    commit_tx_done: bool,
    cancel_on_commit: Option<Context>,
}

/// Fake pool understanding three statements: any `INSERT` stores its first
/// argument, any `SELECT` lists what is visible, and `FAIL` fails.
///
/// Statements containing a fragment registered with [`FakeDriver::on_query`]
/// or [`FakeDriver::on_exec`] get the scripted answer instead.
#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<State>>,
}

fn failure(msg: &str) -> DbError {
    DbError::Driver(sqlx::Error::Protocol(msg.to_string()))
}

fn first_arg(args: &[Value]) -> String {
    match args.first() {
        Some(Value::Text(s)) => s.clone(),
        Some(other) => format!("{other:?}"),
        None => String::new(),
    }
}

impl State {
    fn script(&self, sql: &str) -> Option<&Script> {
        self.scripts.iter().find(|s| sql.contains(&s.fragment))
    }

    fn record(&mut self, event: Event, sql: &str, args: &[Value]) {
        self.events.push(event);
        self.statements.push((sql.to_string(), args.to_vec()));
    }

    fn answer(&self, sql: &str, visible: Vec<String>) -> DbResult<BoxCursor<'static>> {
        if sql == "FAIL" {
            return Err(failure("statement failed"));
        }
        let cursor: BoxCursor<'static> = match self.script(sql) {
            Some(script) => Box::new(VecCursor {
                columns: script.columns.clone(),
                rows: script.rows.clone().into_iter(),
            }),
            None => rows_of(visible),
        };
        Ok(cursor)
    }
}

fn rows_of(names: Vec<String>) -> BoxCursor<'static> {
    Box::new(VecCursor {
        columns: vec!["name".to_string()],
        rows: names.into_iter().map(|n| vec![Value::Text(n)]).collect::<Vec<_>>().into_iter(),
    })
}

impl FakeDriver {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Answer queries containing `fragment` with `rows`
    pub fn on_query(&self, fragment: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        self.lock().scripts.push(Script {
            fragment: fragment.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            rows_affected: 0,
        });
    }

    /// Report `rows_affected` for statements containing `fragment`
    pub fn on_exec(&self, fragment: &str, rows_affected: u64) {
        self.lock().scripts.push(Script {
            fragment: fragment.to_string(),
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected,
        });
    }

    /// Arguments of the most recent statement containing `fragment`
    pub fn args_of(&self, fragment: &str) -> Option<Vec<Value>> {
        self.lock()
            .statements
            .iter()
            .rev()
            .find(|(sql, _)| sql.contains(fragment))
            .map(|(_, args)| args.clone())
    }

    /// Values inserted outside a transaction or by a committed one
    pub fn committed(&self) -> Vec<String> {
        self.lock().committed.clone()
    }

    /// Fail the next `n` acquisitions with a bad connection
    pub fn bad_connections(&self, n: usize) {
        self.lock().bad_connections = n;
    }

    pub fn fail_begin(&self) {
        self.lock().fail_begin = true;
    }

    pub fn fail_rollback(&self) {
        self.lock().fail_rollback = true;
    }

    pub fn fail_release(&self) {
        self.lock().fail_release = true;
    }

    /// Commit reports the transaction as already finalized, cancelling `ctx` first
    pub fn commit_fails_with_tx_done(&self, ctx: Option<Context>) {
        let mut state = self.lock();
        state.commit_tx_done = true;
        state.cancel_on_commit = ctx;
    }
}

#[async_trait]
impl Driver for FakeDriver {
    async fn query<'a>(&'a self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>> {
        let mut state = self.lock();
        state.record(Event::Query(On::Pool, sql.to_string()), sql, args);
        let visible = state.committed.clone();
        state.answer(sql, visible)
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let mut state = self.lock();
        state.record(Event::Exec(On::Pool, sql.to_string()), sql, args);
        if sql == "FAIL" {
            return Err(failure("statement failed"));
        }
        if let Some(script) = state.script(sql) {
            return Ok(ExecResult {
                rows_affected: script.rows_affected,
            });
        }
        if sql.starts_with("INSERT") {
            state.committed.push(first_arg(args));
        }
        Ok(ExecResult { rows_affected: 1 })
    }

    async fn prepare(&self, sql: &str) -> DbResult<Statement> {
        self.lock().events.push(Event::Prepare(On::Pool, sql.to_string()));
        Ok(describe(sql))
    }

    async fn acquire(&self) -> DbResult<Box<dyn Session>> {
        let mut state = self.lock();
        state.events.push(Event::Acquire);
        if state.bad_connections > 0 {
            state.bad_connections -= 1;
            return Err(DbError::BadConnection(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))));
        }
        state.next_id += 1;
        Ok(Box::new(FakeSession {
            id: state.next_id,
            state: self.state.clone(),
            in_tx: false,
            pending: Vec::new(),
        }))
    }
}

fn describe(sql: &str) -> Statement {
    Statement {
        sql: sql.to_string(),
        columns: if sql.starts_with("SELECT") {
            vec!["name".to_string()]
        } else {
            Vec::new()
        },
        param_count: sql.matches('$').count(),
    }
}

struct FakeSession {
    id: u32,
    state: Arc<Mutex<State>>,
    in_tx: bool,
    pending: Vec<String>,
}

impl FakeSession {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Session for FakeSession {
    async fn query<'a>(&'a mut self, sql: &'a str, args: &'a [Value]) -> DbResult<BoxCursor<'a>> {
        let mut state = self.state.lock().unwrap();
        state.record(Event::Query(On::Session(self.id), sql.to_string()), sql, args);
        let mut visible = state.committed.clone();
        visible.extend(self.pending.iter().cloned());
        state.answer(sql, visible)
    }

    async fn execute(&mut self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let mut state = self.state.lock().unwrap();
        state.record(Event::Exec(On::Session(self.id), sql.to_string()), sql, args);
        if sql == "FAIL" {
            return Err(failure("statement failed"));
        }
        if let Some(script) = state.script(sql) {
            return Ok(ExecResult {
                rows_affected: script.rows_affected,
            });
        }
        if sql.starts_with("INSERT") {
            if self.in_tx {
                self.pending.push(first_arg(args));
            } else {
                state.committed.push(first_arg(args));
            }
        }
        Ok(ExecResult { rows_affected: 1 })
    }

    async fn prepare(&mut self, sql: &str) -> DbResult<Statement> {
        self.lock().events.push(Event::Prepare(On::Session(self.id), sql.to_string()));
        Ok(describe(sql))
    }

    async fn begin(&mut self, options: &TxOptions) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Begin(self.id, *options));
        if state.fail_begin {
            return Err(failure("begin failed"));
        }
        self.in_tx = true;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        if !self.in_tx {
            return Err(DbError::TxDone);
        }
        self.in_tx = false;
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Commit(self.id));
        if state.commit_tx_done {
            if let Some(ctx) = &state.cancel_on_commit {
                ctx.cancel();
            }
            self.pending.clear();
            return Err(DbError::TxDone);
        }
        state.committed.append(&mut self.pending);
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        if !self.in_tx {
            return Err(DbError::TxDone);
        }
        self.in_tx = false;
        self.pending.clear();
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Rollback(self.id));
        if state.fail_rollback {
            return Err(failure("rollback failed"));
        }
        Ok(())
    }

    async fn release(self: Box<Self>) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Release(self.id));
        if state.fail_release {
            return Err(failure("release failed"));
        }
        Ok(())
    }
}

struct VecCursor {
    columns: Vec<String>,
    rows: std::vec::IntoIter<Vec<Value>>,
}

#[async_trait]
impl RowCursor for VecCursor {
    fn columns(&self) -> DbResult<Vec<String>> {
        Ok(self.columns.clone())
    }

    async fn next_row(&mut self) -> Option<DbResult<Vec<Value>>> {
        self.rows.next().map(Ok)
    }
}
