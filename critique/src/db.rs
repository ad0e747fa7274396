//! Data store: SQLite pool setup and the embedded schema.
//!
//! Connections are checked out of the pool per query and handed back on drop,
//! so a failing request never leaks one. SQLite's own single-writer locking is
//! the only coordination between concurrent writers.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

/// Drops and recreates both tables. Applied by `critique init-db`.
pub const SCHEMA: &str = r#"
DROP TABLE IF EXISTS user;
DROP TABLE IF EXISTS film;

CREATE TABLE user (
    id_user  INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password TEXT NOT NULL,
    mail     TEXT UNIQUE NOT NULL
);

CREATE TABLE film (
    id_film     INTEGER PRIMARY KEY AUTOINCREMENT,
    author_id   TEXT NOT NULL,
    created     TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    title       TEXT NOT NULL,
    realisateur TEXT NOT NULL,
    date_sortie TEXT NOT NULL,
    synopsis    TEXT NOT NULL,
    modify_by   INTEGER,
    modified    TIMESTAMP
);
"#;

const MAX_CONNECTIONS: u32 = 5;

/// Open a pool on the database file. `create` controls whether a missing file is created.
pub async fn connect(path: &Path, create: bool) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
}

/// Single-connection in-memory pool. Every connection to `:memory:` is its own
/// database, so the pool must never open a second one or drop the first.
#[cfg(test)]
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new().in_memory(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
}

pub async fn init_schema(db: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(db).await?;
    Ok(())
}

/// Whether both application tables exist.
pub async fn schema_present(db: &SqlitePool) -> Result<bool, sqlx::Error> {
    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('user', 'film')",
    )
    .fetch_one(db)
    .await?;
    Ok(tables == 2)
}
