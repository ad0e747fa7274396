//! HTTP layer: Axum router, per-request context, login guard and view models.
//!
//! Every page is rendered as a JSON view model (`{"view": ..., "user": ...,
//! "flashes": [...]}`); success paths of the form posts redirect home.

mod auth;
mod context;
mod error;
mod handlers;
mod responses;
mod state;

#[cfg(test)]
mod tests;

pub use handlers::router;
pub use state::{cookie_key, AppState};
