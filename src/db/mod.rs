//! Engine-agnostic query execution.
//!
//! Stores write every statement with positional `?` placeholders and hand it to a
//! [`QueryExecutor`]. Each adapter renders the template for its own engine, binds
//! the parameters, and decodes result rows into [`Row`] values, so nothing outside
//! this module knows which relational engine sits behind the pool.

pub mod migrate;
pub mod mysql;
pub mod placeholders;
pub mod postgres;
pub mod sqlite;

use crate::config::DatabaseConfig;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    Column, ColumnIndex, Database, Decode, Encode, Executor, IntoArguments, Pool, Type, TypeInfo,
    query::Query,
};
use std::{fmt, future::Future, str::FromStr, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

pub use placeholders::PlaceholderStyle;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("column `{column}` missing or not decodable")]
    Decode { column: String },
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Database(sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Map a driver error onto the store taxonomy. Constraint classification
/// happens here and nowhere else.
fn classify(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::UniqueViolation,
        _ => StoreError::Database(err),
    }
}

/// Supported relational engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    MySql,
    Postgres,
    Sqlite,
}

impl Engine {
    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Engine::MySql | Engine::Sqlite => PlaceholderStyle::Positional,
            Engine::Postgres => PlaceholderStyle::Numbered,
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Engine::MySql => 3306,
            Engine::Postgres => 5432,
            Engine::Sqlite => 0,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Engine::MySql => "mysql",
            Engine::Postgres => "postgres",
            Engine::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Engine::MySql),
            "postgres" | "postgresql" | "pg" => Ok(Engine::Postgres),
            "sqlite" => Ok(Engine::Sqlite),
            other => Err(format!("unknown database engine `{other}`")),
        }
    }
}

/// A bound parameter or a decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(value.into())
    }

    /// `None` and empty strings both bind as NULL.
    pub fn opt_text(value: Option<&str>) -> Self {
        match value {
            Some(v) if !v.is_empty() => SqlValue::Text(v.to_string()),
            _ => SqlValue::Null,
        }
    }
}

/// One statement for [`QueryExecutor::execute_all`].
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// A decoded result row, addressed by column name.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    fn value(&self, column: &str) -> StoreResult<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| decode_error(column))
    }

    pub fn get_i64(&self, column: &str) -> StoreResult<i64> {
        match self.value(column)? {
            SqlValue::Int(v) => Ok(*v),
            SqlValue::Text(v) => v.parse().map_err(|_| decode_error(column)),
            _ => Err(decode_error(column)),
        }
    }

    pub fn get_string(&self, column: &str) -> StoreResult<String> {
        self.get_opt_string(column)?
            .ok_or_else(|| decode_error(column))
    }

    pub fn get_opt_string(&self, column: &str) -> StoreResult<Option<String>> {
        match self.value(column)? {
            SqlValue::Null => Ok(None),
            SqlValue::Text(v) => Ok(Some(v.clone())),
            SqlValue::Int(v) => Ok(Some(v.to_string())),
            SqlValue::Timestamp(v) => Ok(Some(v.to_rfc3339())),
        }
    }

    pub fn get_timestamp(&self, column: &str) -> StoreResult<DateTime<Utc>> {
        match self.value(column)? {
            SqlValue::Timestamp(v) => Ok(*v),
            SqlValue::Text(v) => parse_timestamp(v).ok_or_else(|| decode_error(column)),
            _ => Err(decode_error(column)),
        }
    }
}

fn decode_error(column: &str) -> StoreError {
    StoreError::Decode {
        column: column.to_string(),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Result of one statement: decoded rows for queries, an affected-row count for
/// writes.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub rows: Vec<Row>,
    pub rows_affected: u64,
}

impl RowSet {
    fn from_rows(rows: Vec<Row>) -> Self {
        let rows_affected = rows.len() as u64;
        Self {
            rows,
            rows_affected,
        }
    }

    fn affected(rows_affected: u64) -> Self {
        Self {
            rows: Vec::new(),
            rows_affected,
        }
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The single seam between the stores and a relational engine.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn engine(&self) -> Engine;

    /// Render `template` for this engine, bind `params` in order, and run it.
    async fn execute(&self, template: &str, params: &[SqlValue]) -> StoreResult<RowSet>;

    /// Run every statement inside one transaction. The first failure rolls back
    /// the whole batch.
    async fn execute_all(&self, statements: &[Statement]) -> StoreResult<Vec<RowSet>>;

    async fn ping(&self) -> StoreResult<()> {
        self.execute("SELECT 1", &[]).await.map(|_| ())
    }

    /// Drain the pool. Further calls fail.
    async fn close(&self);
}

/// Open the pool for the configured engine.
pub async fn connect(cfg: &DatabaseConfig) -> StoreResult<Arc<dyn QueryExecutor>> {
    let executor: Arc<dyn QueryExecutor> = match cfg.engine {
        Engine::MySql => Arc::new(mysql::MySqlExecutor::connect(cfg).await?),
        Engine::Postgres => Arc::new(postgres::PostgresExecutor::connect(cfg).await?),
        Engine::Sqlite => Arc::new(sqlite::SqliteExecutor::connect(cfg).await?),
    };
    info!(
        engine = %cfg.engine,
        max_connections = cfg.max_connections,
        "database pool ready"
    );
    Ok(executor)
}

/// True when the statement produces a result set rather than a row count.
fn returns_rows(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH") || upper.contains("RETURNING")
}

pub(crate) async fn with_timeout<T, F>(limit: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

fn bind_params<'q, DB>(
    mut query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    i64: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
    DateTime<Utc>: Encode<'q, DB> + Type<DB>,
{
    for param in params {
        query = match param.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
        };
    }
    query
}

/// Write counts, which every driver reports through its own result type.
trait RowsAffected {
    fn affected_rows(&self) -> u64;
}

impl RowsAffected for sqlx::mysql::MySqlQueryResult {
    fn affected_rows(&self) -> u64 {
        self.rows_affected()
    }
}

impl RowsAffected for sqlx::postgres::PgQueryResult {
    fn affected_rows(&self) -> u64 {
        self.rows_affected()
    }
}

impl RowsAffected for sqlx::sqlite::SqliteQueryResult {
    fn affected_rows(&self) -> u64 {
        self.rows_affected()
    }
}

/// Bind and run one already-rendered statement on a pool or a transaction.
async fn run_statement<'c, DB, E>(
    executor: E,
    sql: &str,
    params: &[SqlValue],
) -> StoreResult<RowSet>
where
    DB: Database,
    DB::QueryResult: RowsAffected,
    E: Executor<'c, Database = DB> + 'c,
    for<'q> DB::Arguments<'q>: IntoArguments<'q, DB>,
    for<'q> i64: Encode<'q, DB> + Type<DB>,
    for<'q> String: Encode<'q, DB> + Type<DB>,
    for<'q> Option<String>: Encode<'q, DB> + Type<DB>,
    for<'q> DateTime<Utc>: Encode<'q, DB> + Type<DB>,
    usize: ColumnIndex<DB::Row>,
    for<'r> Option<i64>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<i32>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<String>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<DateTime<Utc>>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<NaiveDateTime>: Decode<'r, DB> + Type<DB>,
{
    let query = bind_params(sqlx::query::<DB>(sql), params);
    if returns_rows(sql) {
        let rows = query.fetch_all(executor).await.map_err(classify)?;
        let rows = rows.iter().map(decode_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(RowSet::from_rows(rows))
    } else {
        let done = query.execute(executor).await.map_err(classify)?;
        Ok(RowSet::affected(done.affected_rows()))
    }
}

/// Render and run `statements` in one transaction; any failure rolls back.
async fn run_batch<DB>(
    pool: &Pool<DB>,
    engine: Engine,
    statements: &[Statement],
) -> StoreResult<Vec<RowSet>>
where
    DB: Database,
    DB::QueryResult: RowsAffected,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
    for<'q> DB::Arguments<'q>: IntoArguments<'q, DB>,
    for<'q> i64: Encode<'q, DB> + Type<DB>,
    for<'q> String: Encode<'q, DB> + Type<DB>,
    for<'q> Option<String>: Encode<'q, DB> + Type<DB>,
    for<'q> DateTime<Utc>: Encode<'q, DB> + Type<DB>,
    usize: ColumnIndex<DB::Row>,
    for<'r> Option<i64>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<i32>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<String>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<DateTime<Utc>>: Decode<'r, DB> + Type<DB>,
    for<'r> Option<NaiveDateTime>: Decode<'r, DB> + Type<DB>,
{
    let mut tx = pool.begin().await.map_err(classify)?;
    let mut results = Vec::with_capacity(statements.len());

    for stmt in statements {
        let sql = engine.placeholder_style().render(&stmt.sql);
        debug!(engine = %engine, sql = %sql, "executing batched statement");
        results.push(run_statement(&mut *tx, &sql, &stmt.params).await?);
    }

    tx.commit().await.map_err(classify)?;
    Ok(results)
}

#[derive(Clone, Copy)]
enum ColumnKind {
    Int,
    Timestamp,
    Text,
}

fn column_kind(type_name: &str) -> ColumnKind {
    let upper = type_name.to_ascii_uppercase();
    if upper.contains("INT") {
        ColumnKind::Int
    } else if upper.contains("TIME") || upper.contains("DATE") {
        ColumnKind::Timestamp
    } else {
        ColumnKind::Text
    }
}

fn decode_row<R>(row: &R) -> StoreResult<Row>
where
    R: sqlx::Row,
    usize: ColumnIndex<R>,
    for<'r> Option<i64>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> Option<i32>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> Option<String>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> Option<DateTime<Utc>>: Decode<'r, R::Database> + Type<R::Database>,
    for<'r> Option<NaiveDateTime>: Decode<'r, R::Database> + Type<R::Database>,
{
    let mut columns = Vec::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = match column_kind(column.type_info().name()) {
            ColumnKind::Int => row
                .try_get::<Option<i64>, _>(idx)
                .or_else(|_| row.try_get::<Option<i32>, _>(idx).map(|v| v.map(i64::from)))
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Int)),
            ColumnKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)
                .or_else(|_| {
                    row.try_get::<Option<NaiveDateTime>, _>(idx)
                        .map(|v| v.map(|naive| naive.and_utc()))
                })
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Timestamp)),
            // Expression columns (`SELECT 1`) may carry no declared type.
            ColumnKind::Text => row
                .try_get::<Option<String>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Text))
                .or_else(|_| {
                    row.try_get::<Option<i64>, _>(idx)
                        .map(|v| v.map_or(SqlValue::Null, SqlValue::Int))
                }),
        }
        .map_err(|_| decode_error(&name))?;
        columns.push((name, value));
    }
    Ok(Row { columns })
}
