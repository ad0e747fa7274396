use axum_extra::extract::cookie::Key;
use tracing::warn;

use crate::auth::Accounts;
use crate::catalog::Catalog;
use crate::config::ConfigError;
use crate::session::SessionStore;

/// Everything a request handler may touch. Cloned per request; all fields share
/// their backing storage.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Accounts,
    pub catalog: Catalog,
    pub sessions: SessionStore,
    pub cookie_key: Key,
}

/// Signing key for the session cookie. Without a configured secret a random key
/// is generated, which logs everyone out on restart.
pub fn cookie_key(secret: Option<&str>) -> Result<Key, ConfigError> {
    match secret {
        Some(secret) => Key::try_from(secret.as_bytes())
            .map_err(|_| ConfigError::SecretTooShort { len: secret.len() }),
        None => {
            warn!("no secret key configured; sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}
