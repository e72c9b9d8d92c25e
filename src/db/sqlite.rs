//! SQLite adapter (`?` placeholders). Used for local development and tests.

use super::{
    Engine, QueryExecutor, RowSet, SqlValue, Statement, StoreResult, classify, run_batch,
    run_statement, with_timeout,
};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr, time::Duration};
use tracing::{debug, info};

pub struct SqliteExecutor {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteExecutor {
    pub async fn connect(cfg: &DatabaseConfig) -> StoreResult<Self> {
        let db_url = cfg.url.as_deref().unwrap_or("sqlite://./data/psdb.db");
        debug!("Connecting using raw URL => {}", db_url);

        // Create parent directory if needed
        let db_path = db_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:")
            .trim_start_matches("file:");
        if !db_path.starts_with(":memory:") {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)
                        .map_err(|err| classify(sqlx::Error::Io(err)))?;
                    info!("Created missing directory {:?}", parent);
                }
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)
            .map_err(classify)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(cfg.timeout)
            .connect_with(options)
            .await
            .map_err(classify)?;

        Ok(Self {
            pool,
            timeout: cfg.timeout,
        })
    }

    /// A private in-memory database on a single pinned connection.
    #[cfg(test)]
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(classify)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(classify)?;
        Ok(Self {
            pool,
            timeout: Duration::from_secs(5),
        })
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn engine(&self) -> Engine {
        Engine::Sqlite
    }

    async fn execute(&self, template: &str, params: &[SqlValue]) -> StoreResult<RowSet> {
        let sql = Engine::Sqlite.placeholder_style().render(template);
        debug!(engine = "sqlite", sql = %sql, params = params.len(), "executing query");
        with_timeout(self.timeout, run_statement(&self.pool, &sql, params)).await
    }

    async fn execute_all(&self, statements: &[Statement]) -> StoreResult<Vec<RowSet>> {
        with_timeout(self.timeout, run_batch(&self.pool, Engine::Sqlite, statements)).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;

    async fn scratch() -> SqliteExecutor {
        let db = SqliteExecutor::in_memory().await.unwrap();
        db.execute(
            "CREATE TABLE things (id INTEGER PRIMARY KEY AUTOINCREMENT, label TEXT NOT NULL UNIQUE, note TEXT NULL)",
            &[],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn writes_report_affected_rows_and_selects_decode() {
        let db = scratch().await;
        let inserted = db
            .execute(
                "INSERT INTO things (label, note) VALUES (?, ?)",
                &[SqlValue::text("a"), SqlValue::Null],
            )
            .await
            .unwrap();
        assert_eq!(inserted.rows_affected, 1);

        let rows = db
            .execute("SELECT id, label, note FROM things WHERE label = ?", &[SqlValue::text("a")])
            .await
            .unwrap();
        let row = rows.first().unwrap();
        assert_eq!(row.get_i64("id").unwrap(), 1);
        assert_eq!(row.get_string("label").unwrap(), "a");
        assert_eq!(row.get_opt_string("note").unwrap(), None);
    }

    #[tokio::test]
    async fn unique_violation_is_classified() {
        let db = scratch().await;
        let insert = "INSERT INTO things (label) VALUES (?)";
        db.execute(insert, &[SqlValue::text("dup")]).await.unwrap();
        let err = db.execute(insert, &[SqlValue::text("dup")]).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation));
    }

    #[tokio::test]
    async fn failed_batch_rolls_back_earlier_statements() {
        let db = scratch().await;
        let insert = "INSERT INTO things (label) VALUES (?)";
        let result = db
            .execute_all(&[
                Statement::new(insert, vec![SqlValue::text("first")]),
                Statement::new(insert, vec![SqlValue::text("first")]),
            ])
            .await;
        assert!(matches!(result, Err(StoreError::UniqueViolation)));

        let rows = db.execute("SELECT id FROM things", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn slow_query_hits_the_timeout() {
        let mut db = SqliteExecutor::in_memory().await.unwrap();
        db.timeout = Duration::from_millis(1);

        let err = db
            .execute(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n WHERE x < 10000000) \
                 SELECT count(*) AS total FROM n",
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(limit) if limit == Duration::from_millis(1)));
    }

    #[tokio::test]
    async fn ping_succeeds_until_closed() {
        let db = scratch().await;
        db.ping().await.unwrap();
        db.close().await;
        assert!(db.ping().await.is_err());
    }
}
