//! Schema bootstrap from the embedded per-engine SQL files.

use super::{Engine, QueryExecutor, Statement, StoreResult};
use tracing::{debug, info};

const MYSQL_INIT: &str = include_str!("../../migrations/mysql/0001_init.sql");
const POSTGRES_INIT: &str = include_str!("../../migrations/postgres/0001_init.sql");
const SQLITE_INIT: &str = include_str!("../../migrations/sqlite/0001_init.sql");

fn init_script(engine: Engine) -> &'static str {
    match engine {
        Engine::MySql => MYSQL_INIT,
        Engine::Postgres => POSTGRES_INIT,
        Engine::Sqlite => SQLITE_INIT,
    }
}

/// Split a script on `;`, dropping `--` comment lines and empty statements.
fn split_statements(sql: &str) -> Vec<Statement> {
    sql.split(';')
        .map(|chunk| {
            chunk
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .map(|stmt| stmt.trim().to_string())
        .filter(|stmt| !stmt.is_empty())
        .map(|stmt| Statement::new(stmt, Vec::new()))
        .collect()
}

/// Create the `users` and `pets` tables if they do not exist yet.
///
/// Safe to run repeatedly. Returns the number of statements executed.
pub async fn run(db: &dyn QueryExecutor) -> StoreResult<usize> {
    let statements = split_statements(init_script(db.engine()));
    info!(
        engine = %db.engine(),
        "Running {} migration statements...",
        statements.len()
    );
    for stmt in &statements {
        debug!("Executing migration SQL: {}", stmt.sql);
    }
    db.execute_all(&statements).await?;
    Ok(statements.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqlValue, sqlite::SqliteExecutor};

    #[test]
    fn every_engine_script_creates_both_tables() {
        for engine in [Engine::MySql, Engine::Postgres, Engine::Sqlite] {
            let statements = split_statements(init_script(engine));
            assert_eq!(statements.len(), 2, "{engine}");
            assert!(statements[0].sql.contains("users"));
            assert!(statements[0].sql.contains("UNIQUE"));
            assert!(statements[1].sql.contains("pets"));
            assert!(statements.iter().all(|s| !s.sql.starts_with("--")));
        }
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let db = SqliteExecutor::in_memory().await.unwrap();
        assert_eq!(run(&db).await.unwrap(), 2);
        assert_eq!(run(&db).await.unwrap(), 2);

        let rows = db
            .execute(
                "SELECT name FROM sqlite_master WHERE type = ? ORDER BY name",
                &[SqlValue::text("table")],
            )
            .await
            .unwrap();
        let names: Vec<String> = rows
            .rows
            .iter()
            .map(|row| row.get_string("name").unwrap())
            .collect();
        assert!(names.contains(&"users".to_string()));
        assert!(names.contains(&"pets".to_string()));
    }
}
