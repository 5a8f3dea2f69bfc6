//! HTTP routes for the bonus program API.
//!
//! Four endpoints: register, login, bonus status, and spending transactions.
//! The two bonus endpoints require a bearer token issued by login.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use sqlx::SqlitePool;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::{issue_token, AuthUser};
use crate::config::ServiceConfig;
use crate::db;
use crate::levels::next_level;
use crate::types::{
    BonusResponse, Credentials, LoginResponse, MessageResponse, NextLevel, SpendingRequest,
    SpendingResponse,
};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: ServiceConfig,
}

/// Errors a request can end with, each mapped to one response.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("User already exists")]
    UserExists,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Invalid spending amount")]
    InvalidSpending,
    #[error("Missing Authorization Header")]
    MissingToken,
    #[error("Token validation failed")]
    InvalidToken,
    #[error("Token could not be issued")]
    TokenCreation,
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServiceError::UserExists => (StatusCode::BAD_REQUEST, "User already exists"),
            ServiceError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            ServiceError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            ServiceError::InvalidSpending => (StatusCode::BAD_REQUEST, "Invalid spending amount"),
            ServiceError::MissingToken => {
                (StatusCode::UNAUTHORIZED, "Missing Authorization Header")
            }
            ServiceError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            ServiceError::TokenCreation | ServiceError::Database(_) => {
                error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        (status, Json(MessageResponse::new(message))).into_response()
    }
}

/// Build the application router.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/bonus", get(bonus))
        .route("/transactions", post(add_spending))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn register(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Response, ServiceError> {
    if db::find_user_by_username(&state.pool, &credentials.username)
        .await?
        .is_some()
    {
        return Err(ServiceError::UserExists);
    }

    db::insert_user(&state.pool, &credentials.username, &credentials.password).await?;
    info!(username = %credentials.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User registered successfully")),
    )
        .into_response())
}

async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<Response, ServiceError> {
    let user = db::find_user_by_credentials(
        &state.pool,
        &credentials.username,
        &credentials.password,
    )
    .await?
    .ok_or(ServiceError::InvalidCredentials)?;

    let token = issue_token(user.id, &state.config.jwt_secret)
        .map_err(|_| ServiceError::TokenCreation)?;

    Ok(Json(LoginResponse {
        msg: "User successfully logined".to_string(),
        token,
    })
    .into_response())
}

async fn bonus(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, ServiceError> {
    let user = db::find_user_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(ServiceError::UserNotFound)?;
    let levels = db::all_levels(&state.pool).await?;

    // min_spending in the response is the remaining distance, not the threshold
    let next = next_level(&levels, user.spending).map(|level| NextLevel {
        level_name: level.level_name.clone(),
        min_spending: level.min_spending - user.spending,
    });

    Ok(Json(BonusResponse {
        current_level: user.level,
        spending: user.spending,
        next_level: next,
    })
    .into_response())
}

async fn add_spending(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<SpendingRequest>, JsonRejection>,
) -> Result<Response, ServiceError> {
    // the user lookup comes first: an unknown subject is 404 even when the
    // body is bad
    db::find_user_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or(ServiceError::UserNotFound)?;

    // a body that does not decode to a number is an invalid amount, the same
    // as a non-positive one
    let Json(request) = payload.map_err(|_| ServiceError::InvalidSpending)?;
    if !request.spending_amount.is_finite() || request.spending_amount <= 0.0 {
        return Err(ServiceError::InvalidSpending);
    }

    let levels = db::all_levels(&state.pool).await?;
    let (new_spending, new_level) =
        db::add_user_spending(&state.pool, auth.user_id, request.spending_amount, &levels)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

    info!(
        user_id = auth.user_id,
        new_spending,
        new_level = %new_level,
        "spending recorded"
    );

    Ok(Json(SpendingResponse {
        msg: "Spending added successfully".to_string(),
        new_spending,
        new_level,
    })
    .into_response())
}
