use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::session::FlashKind;

use super::context::RequestContext;

pub const LOGIN_REQUIRED: &str = "You must be logged in to use this feature";

/// Guard for routes that change the catalog. Anonymous callers are sent home
/// with a notice; signed-in ones pass through untouched.
pub async fn require_login(mut ctx: RequestContext, request: Request, next: Next) -> Response {
    if let Some(user) = ctx.user() {
        debug!(username = %user.username, "authorized request using session");
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "login required");
    ctx.flash(FlashKind::Danger, LOGIN_REQUIRED);
    ctx.redirect("/")
}
