use crate::common::error::AppError;
use crate::modules::auth::handler::ACCESS_COOKIE;
use crate::modules::auth::model::CurrentUser;
use crate::modules::auth::repository::AuthRepository;
use crate::modules::auth::tokens::{self, TokenType};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;

/// `Authorization: Bearer` wins; the `access_token` cookie is the fallback.
pub fn extract_token(headers: &HeaderMap, cookies: &Cookies) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|auth_header| auth_header.to_str().ok())
        .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
        .map(|t| t.trim().to_owned())
        .filter(|t| !t.is_empty())
        .or_else(|| cookies.get(ACCESS_COOKIE).map(|c| c.value().to_owned()))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token from header or cookie
    let token = extract_token(req.headers(), &cookies).ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    // 2. Verify JWT
    let claims = tokens::decode_jwt(&state.config.secret_key, &token, TokenType::Access)
        .map_err(|_| AppError::Unauthorized("Given token not valid for any token type".to_string()))?;

    // 3. Check if token was revoked on logout
    let mut redis = state.redis.get_conn().await?;
    if AuthRepository::is_blacklisted(&mut redis, claims.jti).await? {
        return Err(AppError::Unauthorized("Token is blacklisted".to_string()));
    }

    // 4. Load the user behind the token
    let user_id = claims
        .user_id()
        .map_err(|_| AppError::Unauthorized("Token contained no recognizable user identification".to_string()))?;
    let user = AuthRepository::find_user_by_id(&state.db, user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::Unauthorized("User not found or inactive".to_string()))?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}
