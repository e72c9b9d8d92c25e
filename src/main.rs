use anyhow::{Context, Result};
use std::{io::ErrorKind, path::Path};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod response;
mod routes;
mod services;
mod state;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<()> {
    // --- .env before anything reads the environment ---
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting pet-registry with config: {:?}", cfg);

    // --- Ensure upload directory exists ---
    if !Path::new(&cfg.uploads.dir).exists() {
        fs::create_dir_all(&cfg.uploads.dir)
            .await
            .with_context(|| format!("creating upload directory {}", cfg.uploads.dir))?;
        tracing::info!("Created upload directory at {}", cfg.uploads.dir);
    }

    // --- Open the connection pool ---
    let db = db::connect(&cfg.database)
        .await
        .with_context(|| format!("connecting to {}", cfg.database.engine))?;

    // --- Handle migration mode ---
    if migrate {
        let applied = db::migrate::run(db.as_ref()).await?;
        tracing::info!(statements = applied, "Database migration complete.");
        db.close().await;
        return Ok(()); // exit after migration
    }
    if cfg.database.auto_migrate {
        db::migrate::run(db.as_ref())
            .await
            .context("applying schema on startup")?;
    }

    // --- Build router ---
    let state = state::AppState::new(db.clone(), &cfg.uploads);
    let app = routes::routes::app(state, cfg.status_mode, cfg.uploads.max_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        status_mode = ?cfg.status_mode,
        "Server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("could not listen for ctrl-c: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("could not listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
