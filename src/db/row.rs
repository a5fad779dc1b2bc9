//! Typed extraction from result rows

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::context::Context;
use super::driver::BoxCursor;
use super::error::{DbError, DbResult, DecodeError};
use super::record::Record;
use super::value::Value;

/// One scanned row: column names shared with its result set, one value per column
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value(&self, index: usize) -> Result<(&str, &Value), DecodeError> {
        match (self.columns.get(index), self.values.get(index)) {
            (Some(column), Some(value)) => Ok((column.as_str(), value)),
            _ => Err(DecodeError::ColumnIndex {
                index,
                len: self.values.len(),
            }),
        }
    }

    pub fn try_read_string(&self, index: usize) -> Result<String, DecodeError> {
        let (column, value) = self.value(index)?;
        decode_string(column, value)
    }

    pub fn try_read_i64(&self, index: usize) -> Result<i64, DecodeError> {
        let (column, value) = self.value(index)?;
        decode_i64(column, value)
    }

    pub fn try_read_time(&self, index: usize) -> Result<DateTime<Utc>, DecodeError> {
        let (column, value) = self.value(index)?;
        decode_time(column, value)
    }

    /// Read column `index` as a string.
    ///
    /// # Panics
    ///
    /// Panics on NULL or on a value that is not text, like `sqlx::Row::get`.
    /// Use [`Row::try_read_string`] to handle the failure instead.
    pub fn read_string(&self, index: usize) -> String {
        self.try_read_string(index).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Read column `index` as a 64-bit integer; panics like [`Row::read_string`]
    pub fn read_i64(&self, index: usize) -> i64 {
        self.try_read_i64(index).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Read column `index` as a UTC timestamp; panics like [`Row::read_string`]
    pub fn read_time(&self, index: usize) -> DateTime<Utc> {
        self.try_read_time(index).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Copy every non-null column into the field of `target` with the same name.
    ///
    /// Columns without a matching field and fields without a matching column
    /// are left alone.
    pub fn try_populate<T: Record>(&self, target: &mut T) -> Result<(), DecodeError> {
        let mapping = T::mapping().as_ref().map_err(|e| e.clone())?;
        for (column, value) in self.columns.iter().zip(&self.values) {
            if value.is_null() {
                continue;
            }
            if let Some(setter) = mapping.setter(column) {
                setter.apply(target, column, value)?;
            }
        }
        Ok(())
    }

    /// Panicking form of [`Row::try_populate`]
    pub fn populate<T: Record>(&self, target: &mut T) {
        self.try_populate(target).unwrap_or_else(|e| panic!("{e}"))
    }
}

pub(crate) fn decode_string(column: &str, value: &Value) -> Result<String, DecodeError> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone()).map_err(|_| wrong_type(column, "string", value)),
        Value::Null => Err(null_value(column)),
        _ => Err(wrong_type(column, "string", value)),
    }
}

pub(crate) fn decode_i64(column: &str, value: &Value) -> Result<i64, DecodeError> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Bytes(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| wrong_type(column, "i64", value)),
        Value::Null => Err(null_value(column)),
        _ => Err(wrong_type(column, "i64", value)),
    }
}

pub(crate) fn decode_time(column: &str, value: &Value) -> Result<DateTime<Utc>, DecodeError> {
    match value {
        Value::Timestamp(t) => Ok(*t),
        Value::Bytes(b) => std::str::from_utf8(b)
            .ok()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
            .ok_or_else(|| wrong_type(column, "timestamp", value)),
        Value::Null => Err(null_value(column)),
        _ => Err(wrong_type(column, "timestamp", value)),
    }
}

fn null_value(column: &str) -> DecodeError {
    DecodeError::NullValue {
        column: column.to_string(),
    }
}

pub(crate) fn wrong_type(column: &str, expected: &'static str, value: &Value) -> DecodeError {
    DecodeError::WrongType {
        column: column.to_string(),
        expected,
        found: value.kind(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Ready,
    Exhausted,
    Errored,
}

/// Pull-based reader over a result cursor.
///
/// Scan failures are latched rather than returned: once [`RowReader::advance`]
/// returns false, always check [`RowReader::error`] (or call
/// [`RowReader::finish`]) before trusting that the result set was complete.
pub struct RowReader<'a> {
    cursor: BoxCursor<'a>,
    ctx: Context,
    columns: Arc<[String]>,
    current: Option<Row>,
    state: ReaderState,
    last_error: Option<DbError>,
}

impl<'a> RowReader<'a> {
    pub fn new(cursor: BoxCursor<'a>, ctx: Context) -> DbResult<Self> {
        let columns: Arc<[String]> = cursor.columns()?.into();
        Ok(Self {
            cursor,
            ctx,
            columns,
            current: None,
            state: ReaderState::Ready,
            last_error: None,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Scan the next row; false on exhaustion or on a latched error
    pub async fn advance(&mut self) -> bool {
        if self.state != ReaderState::Ready {
            return false;
        }

        let cursor = &mut self.cursor;
        let next = self
            .ctx
            .run(async move { Ok(cursor.next_row().await) })
            .await
            .and_then(|row| row.transpose());

        match next {
            Ok(Some(values)) => {
                self.current = Some(Row::new(self.columns.clone(), values));
                true
            }
            Ok(None) => {
                self.current = None;
                self.state = ReaderState::Exhausted;
                false
            }
            Err(e) => {
                tracing::debug!("Row scan failed: {}", e);
                self.current = None;
                self.state = ReaderState::Errored;
                self.last_error = Some(e);
                false
            }
        }
    }

    /// Error latched by the most recent [`RowReader::advance`]
    pub fn error(&self) -> Option<&DbError> {
        self.last_error.as_ref()
    }

    /// Consume the reader, surfacing a latched error
    pub fn finish(self) -> DbResult<()> {
        match self.last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Row scanned by the last successful [`RowReader::advance`]
    pub fn row(&self) -> Option<&Row> {
        self.current.as_ref()
    }

    /// Take ownership of the current row
    pub fn take_row(&mut self) -> Option<Row> {
        self.current.take()
    }

    fn current(&self) -> &Row {
        match self.current.as_ref() {
            Some(row) => row,
            None => panic!("no current row: advance() has not returned true"),
        }
    }

    pub fn read_string(&self, index: usize) -> String {
        self.current().read_string(index)
    }

    pub fn read_i64(&self, index: usize) -> i64 {
        self.current().read_i64(index)
    }

    pub fn read_time(&self, index: usize) -> DateTime<Utc> {
        self.current().read_time(index)
    }

    pub fn populate<T: Record>(&self, target: &mut T) {
        self.current().populate(target)
    }

    pub fn try_populate<T: Record>(&self, target: &mut T) -> Result<(), DecodeError> {
        self.current().try_populate(target)
    }

    /// Drain the remaining rows into records
    pub async fn collect_records<T: Record + Default>(mut self) -> DbResult<Vec<T>> {
        let mut records = Vec::new();
        while self.advance().await {
            let mut record = T::default();
            self.current().try_populate(&mut record)?;
            records.push(record);
        }
        self.finish()?;
        Ok(records)
    }
}
