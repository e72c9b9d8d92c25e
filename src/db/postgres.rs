//! PostgreSQL adapter (`$n` placeholders).

use super::{
    Engine, QueryExecutor, RowSet, SqlValue, Statement, StoreResult, classify, run_batch,
    run_statement, with_timeout,
};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
};
use std::{str::FromStr, time::Duration};
use tracing::debug;

pub struct PostgresExecutor {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresExecutor {
    pub async fn connect(cfg: &DatabaseConfig) -> StoreResult<Self> {
        let options = match &cfg.url {
            Some(url) => PgConnectOptions::from_str(url).map_err(classify)?,
            None => PgConnectOptions::new()
                .host(&cfg.host)
                .port(cfg.port)
                .username(&cfg.user)
                .password(&cfg.password)
                .database(&cfg.name)
                .ssl_mode(if cfg.ssl {
                    PgSslMode::Require
                } else {
                    PgSslMode::Disable
                }),
        };

        let pool = PgPoolOptions::new()
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
}

#[async_trait]
impl QueryExecutor for PostgresExecutor {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn execute(&self, template: &str, params: &[SqlValue]) -> StoreResult<RowSet> {
        let sql = Engine::Postgres.placeholder_style().render(template);
        debug!(engine = "postgres", sql = %sql, params = params.len(), "executing query");
        with_timeout(self.timeout, run_statement(&self.pool, &sql, params)).await
    }

    async fn execute_all(&self, statements: &[Statement]) -> StoreResult<Vec<RowSet>> {
        with_timeout(self.timeout, run_batch(&self.pool, Engine::Postgres, statements)).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
