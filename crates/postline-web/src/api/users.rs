use axum::extract::{Query, State};
use axum::{Form, Json};
use postline_core::{hash_password, verify_password};

use crate::auth::middleware::AuthUser;
use crate::dto::{ListUsersQuery, LoginForm, RegisterRequest, TokenResponse, UserResponse};
use crate::error::AppError;
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    body.validate()?;

    // Cheap pre-check so duplicates skip the hashing cost; the store still
    // enforces uniqueness atomically.
    if state.store.find_user_by_username(&body.username).await?.is_some() {
        return Err(AppError::Conflict("Username already registered".to_string()));
    }

    let password = body.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    let user = state.store.create_user(&body.username, &hash).await?;
    tracing::info!(user = %user.username, id = user.id, "user registered");

    Ok(Json(UserResponse::from(&user)))
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, AppError> {
    let rejected = || AppError::Auth("Incorrect username or password".to_string());

    let Some(user) = state.store.find_user_by_username(&form.username).await? else {
        tracing::warn!("Failed login attempt for unknown user: {}", form.username);
        return Err(rejected());
    };

    let hash = user.password_hash.clone();
    let password = form.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&hash, &password)).await??;

    if !valid {
        tracing::warn!("Failed login attempt for user: {}", user.username);
        return Err(rejected());
    }

    let issued = state.tokens.issue(&user.username, state.tokens.default_ttl())?;
    tracing::info!("Token issued for user: {}", user.username);

    Ok(Json(TokenResponse {
        access_token: issued.token,
        token_type: "bearer",
        expires_at: issued.expires_at,
    }))
}

/// Candidate recipients: everyone except the caller.
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state
        .store
        .list_users_except(user.id, query.skip, query.limit)
        .await?;

    Ok(Json(users.iter().map(UserResponse::from).collect()))
}
