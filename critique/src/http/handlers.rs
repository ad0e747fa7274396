use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::Form;
use tower_governor::{
    governor::GovernorConfigBuilder,
    key_extractor::GlobalKeyExtractor,
    GovernorLayer,
};
use tracing::{debug, error, info};

use crate::catalog::FilmFields;
use crate::error::ServiceError;
use crate::session::FlashKind;

use super::auth::require_login;
use super::context::RequestContext;
use super::error::ApiError;
use super::responses::{
    AddFilmForm, HealthResponse, LoginForm, Page, RegisterForm, SearchForm, UpdateFilmForm,
};
use super::state::AppState;

pub fn router(state: AppState) -> Router {
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(20)
            .burst_size(50)
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .unwrap_or_else(|| unreachable!("static governor config is valid")),
    );

    let guarded = Router::new()
        .route("/add", get(add_form).post(add_film))
        .route("/delete/{id}", get(delete_film).post(delete_film))
        .route("/update/{id}", get(update_form).post(update_film))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
        .route("/show_research", get(search_query).post(search_form))
        .route("/show_all", get(show_all))
        .route("/film/{id}", get(show_film))
        .merge(guarded)
        .layer(GovernorLayer::new(governor_conf))
        .layer(
            tower_http::request_id::SetRequestIdLayer::new(
                axum::http::header::HeaderName::from_static("x-request-id"),
                tower_http::request_id::MakeRequestUuid::default(),
            ),
        )
        .layer(tower_http::request_id::PropagateRequestIdLayer::new(
            axum::http::header::HeaderName::from_static("x-request-id"),
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let films = state.catalog.count().await.map_err(internal)?;
    Ok(Json(HealthResponse {
        status: "ok",
        films,
    }))
}

async fn index(ctx: RequestContext) -> Response {
    ctx.render(StatusCode::OK, Page::Index { films: None })
}

async fn register_form(ctx: RequestContext) -> Response {
    ctx.render(StatusCode::OK, Page::Register)
}

async fn register(
    mut ctx: RequestContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response, ApiError> {
    let result = ctx
        .state()
        .accounts
        .register(&form.username, &form.password, &form.email)
        .await;

    match result {
        Ok(_) => {
            ctx.flash(FlashKind::Success, "Account created, you can now log in");
            Ok(ctx.redirect("/"))
        }
        Err(err) => reject(ctx, err, Page::Register),
    }
}

async fn login_form(ctx: RequestContext) -> Response {
    ctx.render(StatusCode::OK, Page::Login)
}

async fn login(mut ctx: RequestContext, Form(form): Form<LoginForm>) -> Result<Response, ApiError> {
    let result = ctx
        .state()
        .accounts
        .login(&form.username, &form.password)
        .await;

    match result {
        Ok(user) => {
            ctx.sign_in(&user);
            ctx.flash(FlashKind::Success, format!("Hello {}!", user.username));
            info!(user_id = user.id, username = %user.username, "user logged in");
            Ok(ctx.redirect("/"))
        }
        Err(err) => reject(ctx, err, Page::Login),
    }
}

async fn logout(mut ctx: RequestContext) -> Response {
    if let Some(user) = ctx.user() {
        info!(username = %user.username, "user logged out");
    }
    ctx.sign_out();
    ctx.redirect("/")
}

async fn add_form(ctx: RequestContext) -> Response {
    ctx.render(StatusCode::OK, Page::Add)
}

async fn add_film(
    mut ctx: RequestContext,
    Form(form): Form<AddFilmForm>,
) -> Result<Response, ApiError> {
    let user = ctx.identity()?;
    let fields = FilmFields::from(form);
    let result = ctx.state().catalog.add(&user.username, &fields).await;

    match result {
        Ok(_) => {
            ctx.flash(
                FlashKind::Success,
                format!("The film {} has been saved!", fields.title),
            );
            Ok(ctx.redirect("/"))
        }
        Err(err) => reject(ctx, err, Page::Add),
    }
}

async fn search_form(
    ctx: RequestContext,
    Form(form): Form<SearchForm>,
) -> Result<Response, ApiError> {
    search(ctx, form.film_title).await
}

async fn search_query(
    ctx: RequestContext,
    Query(query): Query<SearchForm>,
) -> Result<Response, ApiError> {
    search(ctx, query.film_title).await
}

async fn search(ctx: RequestContext, query: String) -> Result<Response, ApiError> {
    let result = ctx.state().catalog.search(&query).await;
    match result {
        Ok(films) => Ok(ctx.render(StatusCode::OK, Page::Index { films: Some(films) })),
        Err(err) => reject(ctx, err, Page::Index { films: None }),
    }
}

async fn show_all(ctx: RequestContext) -> Result<Response, ApiError> {
    let films = ctx.state().catalog.list_all().await.map_err(internal)?;
    debug!(films = films.len(), "all films requested");
    Ok(ctx.render(StatusCode::OK, Page::Index { films: Some(films) }))
}

async fn show_film(ctx: RequestContext, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let film = ctx.state().catalog.get_by_id(id).await.map_err(internal)?;
    debug!(film_id = id, found = film.is_some(), "film requested");
    Ok(ctx.render(StatusCode::OK, Page::Film { film }))
}

async fn delete_film(mut ctx: RequestContext, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let user = ctx.identity()?;
    ctx.state().catalog.delete(id).await.map_err(internal)?;
    debug!(film_id = id, username = %user.username, "delete handled");

    ctx.flash(FlashKind::Success, "The film has been deleted");
    Ok(ctx.render(StatusCode::OK, Page::Index { films: None }))
}

async fn update_form(ctx: RequestContext, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let film = ctx.state().catalog.get_by_id(id).await.map_err(internal)?;
    Ok(ctx.render(StatusCode::OK, Page::Update { film }))
}

async fn update_film(
    mut ctx: RequestContext,
    Path(id): Path<i64>,
    Form(form): Form<UpdateFilmForm>,
) -> Result<Response, ApiError> {
    let user = ctx.identity()?;
    let fields = FilmFields::from(form);
    let result = ctx.state().catalog.update(id, user.id_user, &fields).await;

    match result {
        Ok(film) => {
            ctx.flash(FlashKind::Success, "Your changes have been saved");
            Ok(ctx.render(StatusCode::OK, Page::Film { film }))
        }
        Err(err) if err.is_user_facing() => {
            let film = ctx.state().catalog.get_by_id(id).await.map_err(internal)?;
            reject(ctx, err, Page::Update { film })
        }
        Err(err) => Err(internal(err)),
    }
}

/// Re-render `page` with the error as a notice, or give up with a 500 when the
/// error is not one the user can act on.
fn reject(mut ctx: RequestContext, err: ServiceError, page: Page) -> Result<Response, ApiError> {
    if !err.is_user_facing() {
        return Err(internal(err));
    }
    let status = err.status();
    ctx.flash(FlashKind::Danger, capitalize(&err.to_string()));
    Ok(ctx.render(status, page))
}

fn internal(err: ServiceError) -> ApiError {
    error!(error = %err, "request failed");
    ApiError::Internal
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
