//! Runs parameterized statements and hands back driver-neutral results.
//!
//! Everything above this module sees [`TabularResult`] and [`Value`], never a
//! driver row type. Values are only ever bound as parameters; SQL text is
//! fixed by the caller.

use crate::error::{DbError, ValidationError};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::any::AnyRow;
use sqlx::AnyConnection;
use sqlx::error::ErrorKind;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::sync::Arc;

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Param {
    fn from(value: bool) -> Self {
        Param::Bool(value)
    }
}

impl From<i64> for Param {
    fn from(value: i64) -> Self {
        Param::Int(value)
    }
}

impl From<f64> for Param {
    fn from(value: f64) -> Self {
        Param::Float(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Text(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Text(value)
    }
}

impl From<&String> for Param {
    fn from(value: &String) -> Self {
        Param::Text(value.clone())
    }
}

/// Timestamps are stored as fixed-width RFC 3339 UTC text so that string
/// order is time order on every engine.
impl From<DateTime<Utc>> for Param {
    fn from(value: DateTime<Utc>) -> Self {
        Param::Text(format_timestamp(value))
    }
}

impl From<NaiveDate> for Param {
    fn from(value: NaiveDate) -> Self {
        Param::Text(value.format("%Y-%m-%d").to_string())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map_or(Param::Null, Into::into)
    }
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// What the caller expects back from a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    /// Returns rows.
    Read,
    /// Returns the affected-row count.
    Write,
    /// An `INSERT ... RETURNING <identity_column>`; returns the count and the new id.
    Insert { identity_column: &'static str },
}

/// SQL text plus its positional (`$1`, `$2`, ...) parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: &'static str,
    pub kind: StatementKind,
    pub params: Vec<Param>,
}

impl Statement {
    pub fn read(sql: &'static str) -> Self {
        Self {
            sql,
            kind: StatementKind::Read,
            params: Vec::new(),
        }
    }

    pub fn write(sql: &'static str) -> Self {
        Self {
            sql,
            kind: StatementKind::Write,
            params: Vec::new(),
        }
    }

    pub fn insert(sql: &'static str, identity_column: &'static str) -> Self {
        Self {
            sql,
            kind: StatementKind::Insert { identity_column },
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: impl Into<Param>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// One result row. Column names are shared with the rest of the result set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl ResultRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Column name/value pairs in declared column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .map(|index| &self.values[index])
    }

    fn require(&self, column: &str) -> Result<&Value, DbError> {
        self.get(column)
            .ok_or_else(|| DbError::decode(column, "column not present in result"))
    }

    pub fn get_i64(&self, column: &str) -> Result<i64, DbError> {
        match self.require(column)? {
            Value::Int(value) => Ok(*value),
            other => Err(DbError::decode(column, format!("expected an integer, got {:?}", other))),
        }
    }

    pub fn get_opt_f64(&self, column: &str) -> Result<Option<f64>, DbError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Float(value) => Ok(Some(*value)),
            Value::Int(value) => Ok(Some(*value as f64)),
            other => Err(DbError::decode(column, format!("expected a number, got {:?}", other))),
        }
    }

    /// SQLite has no boolean storage class, so integers 0/1 are accepted too.
    pub fn get_bool(&self, column: &str) -> Result<bool, DbError> {
        match self.require(column)? {
            Value::Bool(value) => Ok(*value),
            Value::Int(value) => Ok(*value != 0),
            Value::Null => Ok(false),
            other => Err(DbError::decode(column, format!("expected a boolean, got {:?}", other))),
        }
    }

    pub fn get_str(&self, column: &str) -> Result<&str, DbError> {
        match self.require(column)? {
            Value::Text(value) => Ok(value),
            other => Err(DbError::decode(column, format!("expected text, got {:?}", other))),
        }
    }

    pub fn get_opt_str(&self, column: &str) -> Result<Option<String>, DbError> {
        match self.require(column)? {
            Value::Null => Ok(None),
            Value::Text(value) => Ok(Some(value.clone())),
            other => Err(DbError::decode(column, format!("expected text, got {:?}", other))),
        }
    }

    pub fn get_timestamp(&self, column: &str) -> Result<DateTime<Utc>, DbError> {
        let text = self.get_str(column)?;
        DateTime::parse_from_rfc3339(text)
            .map(|value| value.with_timezone(&Utc))
            .map_err(|e| DbError::decode(column, format!("invalid timestamp '{}': {}", text, e)))
    }

    pub fn get_opt_date(&self, column: &str) -> Result<Option<NaiveDate>, DbError> {
        match self.get_opt_str(column)? {
            None => Ok(None),
            Some(text) => NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| DbError::decode(column, format!("invalid date '{}': {}", text, e))),
        }
    }
}

/// An ordered set of rows exactly as the database returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<ResultRow>,
}

impl TabularResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteOutcome {
    Rows(TabularResult),
    Affected {
        rows_affected: u64,
        identity: Option<i64>,
    },
}

impl ExecuteOutcome {
    pub fn into_rows(self) -> TabularResult {
        match self {
            ExecuteOutcome::Rows(result) => result,
            ExecuteOutcome::Affected { .. } => TabularResult::default(),
        }
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            ExecuteOutcome::Rows(_) => 0,
            ExecuteOutcome::Affected { rows_affected, .. } => *rows_affected,
        }
    }

    pub fn identity(&self) -> Option<i64> {
        match self {
            ExecuteOutcome::Rows(_) => None,
            ExecuteOutcome::Affected { identity, .. } => *identity,
        }
    }
}

/// Runs one statement on an open connection.
pub async fn execute(conn: &mut AnyConnection, statement: &Statement) -> Result<ExecuteOutcome, DbError> {
    tracing::debug!(sql = statement.sql, params = statement.params.len(), "Executing statement.");

    let mut query = sqlx::query(statement.sql);
    for param in &statement.params {
        query = match param {
            Param::Null => query.bind(Option::<String>::None),
            Param::Bool(value) => query.bind(*value),
            Param::Int(value) => query.bind(*value),
            Param::Float(value) => query.bind(*value),
            Param::Text(value) => query.bind(value.clone()),
        };
    }

    match &statement.kind {
        StatementKind::Read => {
            let rows = query.fetch_all(&mut *conn).await.map_err(map_query_error)?;
            Ok(ExecuteOutcome::Rows(to_tabular(&rows)?))
        }
        StatementKind::Write => {
            let result = query.execute(&mut *conn).await.map_err(map_query_error)?;
            Ok(ExecuteOutcome::Affected {
                rows_affected: result.rows_affected(),
                identity: None,
            })
        }
        StatementKind::Insert { identity_column } => {
            let rows = query.fetch_all(&mut *conn).await.map_err(map_query_error)?;
            let table = to_tabular(&rows)?;
            let identity = match table.rows.first() {
                Some(row) => Some(row.get_i64(identity_column)?),
                None => None,
            };
            Ok(ExecuteOutcome::Affected {
                rows_affected: table.rows.len() as u64,
                identity,
            })
        }
    }
}

fn map_query_error(error: sqlx::Error) -> DbError {
    if let Some(db_error) = error.as_database_error() {
        if db_error.kind() == ErrorKind::ForeignKeyViolation {
            return DbError::Validation(ValidationError::ForeignKey(db_error.message().to_string()));
        }
    }
    DbError::Query(error)
}

fn to_tabular(rows: &[AnyRow]) -> Result<TabularResult, DbError> {
    let Some(first) = rows.first() else {
        return Ok(TabularResult::default());
    };

    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();

    let rows = rows
        .iter()
        .map(|row| {
            let values = (0..columns.len())
                .map(|index| decode_value(row, index, &columns[index]))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ResultRow {
                columns: Arc::clone(&columns),
                values,
            })
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    Ok(TabularResult {
        columns: columns.to_vec(),
        rows,
    })
}

fn decode_value(row: &AnyRow, index: usize, column: &str) -> Result<Value, DbError> {
    let type_name = {
        let raw = row.try_get_raw(index).map_err(DbError::Query)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };

    let decoded = match type_name.as_str() {
        "BOOLEAN" => row.try_get::<bool, _>(index).map(Value::Bool),
        "SMALLINT" => row.try_get::<i16, _>(index).map(|v| Value::Int(v.into())),
        "INTEGER" => row.try_get::<i32, _>(index).map(|v| Value::Int(v.into())),
        "BIGINT" => row.try_get::<i64, _>(index).map(Value::Int),
        "REAL" => row.try_get::<f32, _>(index).map(|v| Value::Float(v.into())),
        "DOUBLE" => row.try_get::<f64, _>(index).map(Value::Float),
        "TEXT" => row.try_get::<String, _>(index).map(Value::Text),
        "BLOB" => row.try_get::<Vec<u8>, _>(index).map(Value::Bytes),
        other => return Err(DbError::decode(column, format!("unsupported column type {}", other))),
    };

    decoded.map_err(|e| DbError::decode(column, e.to_string()))
}
