//! # critique
//!
//! Small movie-review web service: people register, log in, and add, search,
//! edit and delete films in a shared catalog.
//!
//! ## Architecture
//!
//! - **Store**: a SQLite file with a `user` and a `film` table, provisioned by `critique init-db`
//! - **Sessions**: in-memory, keyed by a token carried in a signed cookie
//! - **Auth**: argon2-hashed passwords, unique usernames and emails
//! - **Catalog**: CRUD and substring search over films
//! - **HTTP**: Axum router with a login guard on mutating routes, request IDs and graceful shutdown

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod http;
mod password;
mod session;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::auth::Accounts;
use crate::catalog::Catalog;
use crate::config::{AppConfig, Cli, Command};
use crate::http::{cookie_key, router, AppState};
use crate::session::SessionStore;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("failed to initialize logging")?;

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;

    match config.command {
        Command::InitDb => init_db(&config).await,
        Command::Serve => run_server(config).await,
    }
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}

async fn init_db(config: &AppConfig) -> anyhow::Result<()> {
    if let Some(parent) = config.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let db = db::connect(&config.database, true)
        .await
        .with_context(|| format!("failed to open {}", config.database.display()))?;
    db::init_schema(&db)
        .await
        .context("failed to apply schema")?;
    db.close().await;

    info!(database = %config.database.display(), "initialized the database");
    Ok(())
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    info!(
        bind = %config.bind,
        database = %config.database.display(),
        session_ttl = %humantime::format_duration(config.session_ttl),
        search_mode = ?config.search_mode,
        "configuration loaded"
    );

    let db = db::connect(&config.database, false).await.with_context(|| {
        format!(
            "failed to open {}; run `critique init-db` first",
            config.database.display()
        )
    })?;
    if !db::schema_present(&db).await.context("failed to inspect schema")? {
        warn!(
            database = %config.database.display(),
            "database has no user/film tables; run `critique init-db`"
        );
    }

    let sessions = SessionStore::new(config.session_ttl);
    spawn_session_sweeper(sessions.clone(), SESSION_SWEEP_INTERVAL);

    let state = AppState {
        accounts: Accounts::new(db.clone()),
        catalog: Catalog::new(db.clone(), config.search_mode),
        sessions,
        cookie_key: cookie_key(config.secret_key.as_deref())
            .context("invalid cookie secret key")?,
    };

    let app = router(state);
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "critique listening");

    serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = shutdown.await;
        info!("shutting down gracefully");
    })
    .await
    .context("server exited with error")?;

    db.close().await;
    Ok(())
}

fn spawn_session_sweeper(sessions: SessionStore, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let purged = sessions.purge_expired();
            if purged > 0 {
                debug!(purged, "expired sessions purged");
            }
        }
    });
}
