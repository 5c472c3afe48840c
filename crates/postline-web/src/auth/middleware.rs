use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// The caller of an authenticated route, resolved from its bearer token.
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
            .ok_or_else(AppError::unauthorized)?;

        let username = state.tokens.verify(token)?;

        // The token may outlive the account it was issued for.
        let user = state
            .store
            .find_user_by_username(&username)
            .await?
            .ok_or_else(AppError::unauthorized)?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
        })
    }
}

/// Extracts the credentials of a `Bearer` authorization header. The scheme
/// is matched case-insensitively.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
