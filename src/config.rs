use crate::db::Engine;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

const DEFAULT_UPLOAD_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_ALLOWED_EXTENSIONS: &str = "png,jpg,jpeg,gif,webp,bmp";

/// Centralized application configuration.
/// Combines environment variables (and `.env`) with CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub uploads: UploadConfig,
    pub status_mode: StatusMode,
}

/// Connection settings for the backing store.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub engine: Engine,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl: bool,
    /// Full connection URL; takes precedence over the individual parts.
    pub url: Option<String>,
    pub max_connections: u32,
    pub timeout: Duration,
    pub auto_migrate: bool,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("ssl", &self.ssl)
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("timeout", &self.timeout)
            .field("auto_migrate", &self.auto_migrate)
            .finish()
    }
}

/// Where uploads land and what is accepted.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub dir: String,
    pub max_bytes: u64,
    /// Lowercase extensions without the dot. Empty accepts anything.
    pub allowed_extensions: Vec<String>,
    /// Fixed origin for returned URLs, e.g. `https://cdn.example.com`.
    pub public_base_url: Option<String>,
}

/// How business failures are reported at the transport level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMode {
    /// Always 200; the envelope's `success` flag carries the outcome.
    Compat,
    /// 4xx/5xx for failures, same envelope.
    Rest,
}

impl FromStr for StatusMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compat" => Ok(StatusMode::Compat),
            "rest" => Ok(StatusMode::Rest),
            other => Err(format!("unknown status mode `{other}` (expected compat or rest)")),
        }
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Pet listing and account API")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database engine: mysql, postgres or sqlite (overrides DB_ENGINE)
    #[arg(long)]
    pub db_engine: Option<String>,

    /// Database URL (overrides DATABASE_URL and the DB_* parts)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for uploaded images (overrides UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Create the schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_lookup(args, |key| env::var(key).ok())?, migrate))
    }

    fn from_lookup<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine_raw = args
            .db_engine
            .or_else(|| lookup("DB_ENGINE"))
            .unwrap_or_else(|| "mysql".into());
        let engine = engine_raw
            .parse::<Engine>()
            .map_err(|err| anyhow!(err))
            .context("parsing DB_ENGINE")?;

        let database = DatabaseConfig {
            engine,
            host: lookup("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_var(&lookup, "DB_PORT")?.unwrap_or(engine.default_port()),
            user: lookup("DB_USER").unwrap_or_else(|| "root".into()),
            password: lookup("DB_PASS").unwrap_or_default(),
            name: lookup("DB_NAME").unwrap_or_else(|| "psdb".into()),
            ssl: parse_flag(&lookup, "DB_SSL")?.unwrap_or(false),
            url: args.database_url.or_else(|| lookup("DATABASE_URL")).or_else(|| {
                (engine == Engine::Sqlite).then(|| "sqlite://./data/psdb.db".to_string())
            }),
            max_connections: parse_var(&lookup, "DB_MAX_CONNECTIONS")?.unwrap_or(10),
            timeout: Duration::from_secs(parse_var(&lookup, "DB_TIMEOUT_SECS")?.unwrap_or(10)),
            auto_migrate: parse_flag(&lookup, "DB_AUTO_MIGRATE")?.unwrap_or(false),
        };

        let allowed_extensions = lookup("UPLOAD_ALLOWED_EXTENSIONS")
            .unwrap_or_else(|| DEFAULT_ALLOWED_EXTENSIONS.into())
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        let uploads = UploadConfig {
            dir: args
                .upload_dir
                .or_else(|| lookup("UPLOAD_DIR"))
                .unwrap_or_else(|| "./uploads".into()),
            max_bytes: parse_var(&lookup, "UPLOAD_MAX_BYTES")?.unwrap_or(DEFAULT_UPLOAD_MAX_BYTES),
            allowed_extensions,
            public_base_url: lookup("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
        };

        let status_mode = match lookup("STATUS_MODE") {
            Some(raw) => raw
                .parse::<StatusMode>()
                .map_err(|err| anyhow!(err))
                .context("parsing STATUS_MODE")?,
            None => StatusMode::Compat,
        };

        Ok(Self {
            host: args
                .host
                .or_else(|| lookup("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: match args.port {
                Some(port) => port,
                None => parse_var(&lookup, "PORT")?.unwrap_or(3000),
            },
            database,
            uploads,
            status_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(None),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off" | "") => Ok(Some(false)),
        Some(v) => Err(anyhow!("parsing {} value `{}`: expected a boolean", key, v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_args() -> Args {
        Args::parse_from(["pet-registry"])
    }

    fn config_from(vars: &[(&str, &str)], args: Args) -> Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(args, |key| map.get(key).cloned())
    }

    #[test]
    fn defaults_match_the_deployed_service() {
        let cfg = config_from(&[], no_args()).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.database.engine, Engine::MySql);
        assert_eq!(cfg.database.host, "localhost");
        assert_eq!(cfg.database.port, 3306);
        assert_eq!(cfg.database.user, "root");
        assert_eq!(cfg.database.password, "");
        assert_eq!(cfg.database.name, "psdb");
        assert!(!cfg.database.ssl);
        assert!(cfg.database.url.is_none());
        assert_eq!(cfg.uploads.dir, "./uploads");
        assert_eq!(cfg.uploads.max_bytes, DEFAULT_UPLOAD_MAX_BYTES);
        assert!(cfg.uploads.allowed_extensions.contains(&"png".to_string()));
        assert_eq!(cfg.status_mode, StatusMode::Compat);
    }

    #[test]
    fn engine_choice_drives_port_default_and_sqlite_url() {
        let pg = config_from(&[("DB_ENGINE", "postgres")], no_args()).unwrap();
        assert_eq!(pg.database.port, 5432);

        let sqlite = config_from(&[("DB_ENGINE", "sqlite")], no_args()).unwrap();
        assert_eq!(sqlite.database.url.as_deref(), Some("sqlite://./data/psdb.db"));
    }

    #[test]
    fn cli_flags_override_environment() {
        let args = Args::parse_from(["pet-registry", "--port", "8080", "--upload-dir", "/srv/img"]);
        let cfg = config_from(&[("PORT", "9000"), ("UPLOAD_DIR", "/tmp/x")], args).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.uploads.dir, "/srv/img");
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = config_from(&[("PORT", "abc")], no_args()).unwrap_err();
        assert!(format!("{err:#}").contains("PORT"));

        let err = config_from(&[("DB_SSL", "maybe")], no_args()).unwrap_err();
        assert!(format!("{err:#}").contains("DB_SSL"));

        let err = config_from(&[("STATUS_MODE", "loud")], no_args()).unwrap_err();
        assert!(format!("{err:#}").contains("STATUS_MODE"));
    }

    #[test]
    fn extension_list_is_normalized() {
        let cfg = config_from(&[("UPLOAD_ALLOWED_EXTENSIONS", " .PNG, jpg ,,")], no_args()).unwrap();
        assert_eq!(cfg.uploads.allowed_extensions, vec!["png", "jpg"]);
    }

    #[test]
    fn password_never_appears_in_debug_output() {
        let cfg = config_from(&[("DB_PASS", "hunter2")], no_args()).unwrap();
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }
}
