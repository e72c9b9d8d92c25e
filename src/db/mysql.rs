//! MySQL / MariaDB adapter (`?` placeholders).

use super::{
    Engine, QueryExecutor, RowSet, SqlValue, Statement, StoreResult, classify, run_batch,
    run_statement, with_timeout,
};
use crate::config::DatabaseConfig;
use async_trait::async_trait;
use sqlx::{
    MySqlPool,
    mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlSslMode},
};
use std::{str::FromStr, time::Duration};
use tracing::debug;

pub struct MySqlExecutor {
    pool: MySqlPool,
    timeout: Duration,
}

impl MySqlExecutor {
    pub async fn connect(cfg: &DatabaseConfig) -> StoreResult<Self> {
        let options = match &cfg.url {
            Some(url) => MySqlConnectOptions::from_str(url).map_err(classify)?,
            None => MySqlConnectOptions::new()
                .host(&cfg.host)
                .port(cfg.port)
                .username(&cfg.user)
                .password(&cfg.password)
                .database(&cfg.name)
                .ssl_mode(if cfg.ssl {
                    MySqlSslMode::Required
                } else {
                    MySqlSslMode::Disabled
                }),
        };

        let pool = MySqlPoolOptions::new()
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
impl QueryExecutor for MySqlExecutor {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    async fn execute(&self, template: &str, params: &[SqlValue]) -> StoreResult<RowSet> {
        let sql = Engine::MySql.placeholder_style().render(template);
        debug!(engine = "mysql", sql = %sql, params = params.len(), "executing query");
        with_timeout(self.timeout, run_statement(&self.pool, &sql, params)).await
    }

    async fn execute_all(&self, statements: &[Statement]) -> StoreResult<Vec<RowSet>> {
        with_timeout(self.timeout, run_batch(&self.pool, Engine::MySql, statements)).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
