//! Account registration and credential checks against the `user` table.
//!
//! Passwords are stored as argon2 PHC strings (see [`crate::password`]).
//! Registration checks the username before the email so the first reported
//! conflict matches what the form shows first.

use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{require, ConflictField, ServiceError};
use crate::password::{hash_password, verify_password};

/// A row of the `user` table.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    #[sqlx(rename = "id_user")]
    pub id: i64,
    pub username: String,
    #[sqlx(rename = "password")]
    pub password_hash: String,
    #[sqlx(rename = "mail")]
    pub email: String,
}

impl User {
    pub async fn find_by_username(
        db: &SqlitePool,
        username: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id_user, username, password, mail FROM user WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(db)
        .await
    }

    async fn email_taken(db: &SqlitePool, email: &str) -> Result<bool, sqlx::Error> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id_user FROM user WHERE mail = ?")
            .bind(email)
            .fetch_optional(db)
            .await?;
        Ok(found.is_some())
    }

    async fn create(
        db: &SqlitePool,
        username: &str,
        password_hash: &str,
        email: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO user (username, password, mail)
            VALUES (?, ?, ?)
            RETURNING id_user, username, password, mail
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(email)
        .fetch_one(db)
        .await
    }
}

/// The auth service. Cheap to clone; shares the pool.
#[derive(Debug, Clone)]
pub struct Accounts {
    db: SqlitePool,
}

impl Accounts {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
    ) -> Result<User, ServiceError> {
        require("username", username)?;
        require("password", password)?;
        require("email", email)?;

        if User::find_by_username(&self.db, username).await?.is_some() {
            warn!(username, "registration rejected: username taken");
            return Err(ServiceError::Conflict(ConflictField::Username));
        }
        if User::email_taken(&self.db, email).await? {
            warn!(username, "registration rejected: email taken");
            return Err(ServiceError::Conflict(ConflictField::Email));
        }

        let hash = hash_password(password)?;
        let user = User::create(&self.db, username, &hash, email)
            .await
            .map_err(map_unique_violation)?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check credentials. Session handling is left to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        let Some(user) = User::find_by_username(&self.db, username).await? else {
            warn!(username, "login rejected: unknown user");
            return Err(ServiceError::NotFound(username.to_string()));
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(username, user_id = user.id, "login rejected: wrong password");
            return Err(ServiceError::Auth);
        }

        debug!(user_id = user.id, "credentials verified");
        Ok(user)
    }
}

/// A concurrent registration can slip past the pre-checks; report it the same way.
fn map_unique_violation(err: sqlx::Error) -> ServiceError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = if db_err.message().contains("user.mail") {
                ConflictField::Email
            } else {
                ConflictField::Username
            };
            return ServiceError::Conflict(field);
        }
    }
    ServiceError::Store(err)
}
