//! Per-request context: application state plus the caller's session.
//!
//! Handlers mutate the session through the context and finish with
//! [`RequestContext::render`] or [`RequestContext::redirect`], which write the
//! session back to the store and set or clear the signed cookie.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use tracing::debug;

use crate::auth::User;
use crate::session::{Flash, FlashKind, SessionData, SessionUser};

use super::error::ApiError;
use super::responses::{Page, View};
use super::state::AppState;

pub const SESSION_COOKIE: &str = "critique_session";

pub struct RequestContext {
    state: AppState,
    jar: SignedCookieJar,
    token: Option<String>,
    session: SessionData,
    stale_cookie: bool,
    dirty: bool,
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_headers(&parts.headers, state.cookie_key.clone());
        let presented = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string());

        let (token, session) = match presented.as_deref() {
            Some(token) => match state.sessions.get(token) {
                Some(data) => (Some(token.to_string()), data),
                None => (None, SessionData::default()),
            },
            None => (None, SessionData::default()),
        };
        let stale_cookie = presented.is_some() && token.is_none();
        if stale_cookie {
            debug!("session cookie refers to an expired session");
        }

        Ok(Self {
            state: state.clone(),
            jar,
            token,
            session,
            stale_cookie,
            dirty: false,
        })
    }
}

impl RequestContext {
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.session.user.as_ref()
    }

    /// The signed-in identity, for handlers behind the login guard.
    pub fn identity(&self) -> Result<SessionUser, ApiError> {
        self.user().cloned().ok_or(ApiError::Unauthorized)
    }

    pub fn flash(&mut self, category: FlashKind, message: impl Into<String>) {
        self.session.flashes.push(Flash {
            category,
            message: message.into(),
        });
        self.dirty = true;
    }

    /// Start a fresh session for `user`. Any previous session, including its
    /// pending notices, is discarded and a new token is issued.
    pub fn sign_in(&mut self, user: &User) {
        if let Some(old) = self.token.take() {
            self.state.sessions.remove(&old);
        }
        self.session = SessionData {
            user: Some(SessionUser {
                id_user: user.id,
                username: user.username.clone(),
            }),
            flashes: Vec::new(),
        };
        self.dirty = true;
    }

    /// Drop the session entirely. Safe to call without one.
    pub fn sign_out(&mut self) {
        if let Some(old) = self.token.take() {
            self.state.sessions.remove(&old);
            self.stale_cookie = true;
        }
        self.session = SessionData::default();
        self.dirty = true;
    }

    /// Render `page`, draining pending flash notices into it.
    pub fn render(mut self, status: StatusCode, page: Page) -> Response {
        let flashes = std::mem::take(&mut self.session.flashes);
        if !flashes.is_empty() {
            self.dirty = true;
        }
        let view = View {
            page,
            user: self.session.user.clone(),
            flashes,
        };
        let jar = self.into_jar();
        (status, jar, Json(view)).into_response()
    }

    /// 303 to `to`. Pending notices stay in the session for the next view.
    pub fn redirect(self, to: &str) -> Response {
        let jar = self.into_jar();
        (jar, Redirect::to(to)).into_response()
    }

    fn into_jar(self) -> SignedCookieJar {
        let Self {
            state,
            jar,
            token,
            session,
            stale_cookie,
            dirty,
        } = self;

        if !dirty {
            return if stale_cookie { jar.remove(removal_cookie()) } else { jar };
        }

        match token {
            Some(token) if session.is_empty() => {
                state.sessions.remove(&token);
                jar.remove(removal_cookie())
            }
            Some(token) => {
                if state.sessions.save(&token, session) {
                    jar
                } else {
                    debug!("session ended while the request was in flight");
                    jar.remove(removal_cookie())
                }
            }
            None if session.is_empty() => {
                if stale_cookie {
                    jar.remove(removal_cookie())
                } else {
                    jar
                }
            }
            None => {
                let token = state.sessions.create(session);
                jar.add(session_cookie(token))
            }
        }
    }
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}
