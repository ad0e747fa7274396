//! Catalog: the `film` table and the operations on it.
//!
//! Rows come back in storage order (`id_film`). A missing row is never an error
//! here: lookups return `None` and deletes report how many rows went away.

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::{require, ServiceError};

const FILM_COLUMNS: &str =
    "id_film, author_id, created, title, realisateur, date_sortie, synopsis, modify_by, modified";

/// A row of the `film` table.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Film {
    #[sqlx(rename = "id_film")]
    pub id: i64,
    /// Username of the creator.
    #[sqlx(rename = "author_id")]
    pub author: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    pub title: String,
    #[sqlx(rename = "realisateur")]
    pub director: String,
    #[sqlx(rename = "date_sortie")]
    pub release_date: String,
    pub synopsis: String,
    /// `id_user` of the last editor.
    #[sqlx(rename = "modify_by")]
    pub modified_by: Option<i64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub modified: Option<OffsetDateTime>,
}

/// The user-editable part of a film.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilmFields {
    pub title: String,
    pub director: String,
    pub release_date: String,
    pub synopsis: String,
}

impl FilmFields {
    fn validate(&self) -> Result<(), ServiceError> {
        require("title", &self.title)?;
        require("director", &self.director)?;
        require("release date", &self.release_date)?;
        require("synopsis", &self.synopsis)
    }
}

/// How `search` compares titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    CaseSensitive,
    CaseInsensitive,
}

/// The movie catalog service. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: SqlitePool,
    search_mode: SearchMode,
}

impl Catalog {
    pub fn new(db: SqlitePool, search_mode: SearchMode) -> Self {
        Self { db, search_mode }
    }

    /// Insert a film stamped with `author` and the current time. Returns the new id.
    pub async fn add(&self, author: &str, fields: &FilmFields) -> Result<i64, ServiceError> {
        fields.validate()?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO film (author_id, created, title, realisateur, date_sortie, synopsis)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id_film
            "#,
        )
        .bind(author)
        .bind(OffsetDateTime::now_utc())
        .bind(&fields.title)
        .bind(&fields.director)
        .bind(&fields.release_date)
        .bind(&fields.synopsis)
        .fetch_one(&self.db)
        .await?;

        info!(film_id = id, author, title = %fields.title, "film added");
        Ok(id)
    }

    /// Films whose title contains `query` as a literal substring.
    pub async fn search(&self, query: &str) -> Result<Vec<Film>, ServiceError> {
        require("search query", query)?;

        let films = match self.search_mode {
            SearchMode::CaseSensitive => {
                sqlx::query_as::<_, Film>(&format!(
                    "SELECT {FILM_COLUMNS} FROM film WHERE instr(title, ?) > 0 ORDER BY id_film"
                ))
                .bind(query)
                .fetch_all(&self.db)
                .await?
            }
            SearchMode::CaseInsensitive => {
                sqlx::query_as::<_, Film>(&format!(
                    "SELECT {FILM_COLUMNS} FROM film WHERE title LIKE ? ESCAPE '\\' ORDER BY id_film"
                ))
                .bind(like_pattern(query))
                .fetch_all(&self.db)
                .await?
            }
        };

        debug!(query, mode = ?self.search_mode, results = films.len(), "film search");
        Ok(films)
    }

    pub async fn list_all(&self) -> Result<Vec<Film>, ServiceError> {
        let films =
            sqlx::query_as::<_, Film>(&format!("SELECT {FILM_COLUMNS} FROM film ORDER BY id_film"))
                .fetch_all(&self.db)
                .await?;
        Ok(films)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Film>, ServiceError> {
        let film =
            sqlx::query_as::<_, Film>(&format!("SELECT {FILM_COLUMNS} FROM film WHERE id_film = ?"))
                .bind(id)
                .fetch_optional(&self.db)
                .await?;
        Ok(film)
    }

    /// Overwrite the editable fields and stamp the editor's id. Returns the refreshed
    /// row, or `None` when no film has this id.
    pub async fn update(
        &self,
        id: i64,
        editor_id: i64,
        fields: &FilmFields,
    ) -> Result<Option<Film>, ServiceError> {
        fields.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE film
               SET title = ?, realisateur = ?, date_sortie = ?, synopsis = ?,
                   modify_by = ?, modified = ?
             WHERE id_film = ?
            "#,
        )
        .bind(&fields.title)
        .bind(&fields.director)
        .bind(&fields.release_date)
        .bind(&fields.synopsis)
        .bind(editor_id)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            debug!(film_id = id, "update matched no film");
            return Ok(None);
        }
        info!(film_id = id, editor_id, "film updated");
        self.get_by_id(id).await
    }

    /// Delete unconditionally. Returns the number of rows removed (0 or 1).
    pub async fn delete(&self, id: i64) -> Result<u64, ServiceError> {
        let result = sqlx::query("DELETE FROM film WHERE id_film = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        let removed = result.rows_affected();
        info!(film_id = id, removed, "film deleted");
        Ok(removed)
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM film")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}

/// `%query%` with LIKE metacharacters escaped by `\`.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}
