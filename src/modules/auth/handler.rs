use super::dto::{
    LoginRequest, LoginResponse, LoginUser, PasswordConfirmRequest, PasswordResetRequest, RefreshResponse,
    RegisterRequest, RegisterResponse, RegisteredUser,
};
use super::service::{ActivationOutcome, AuthService};
use crate::common::error::AppError;
use crate::common::response::{ApiSuccess, DetailResponse, MessageResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use validator::Validate;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn auth_cookie(name: &'static str, value: String, ttl_secs: u64, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(ttl_secs as i64))
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Register a new (inactive) account and send the activation email
#[utoipa::path(
    post,
    path = "/api/register/",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created, activation email sent", body = RegisterResponse),
        (status = 400, description = "Validation error"),
        (status = 503, description = "Activation email could not be sent")
    ),
    tag = "Auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = AuthService::register(&state, payload).await?;

    Ok(ApiSuccess(
        RegisterResponse {
            user: RegisteredUser {
                id: user.id,
                email: user.email,
            },
        },
        StatusCode::CREATED,
    ))
}

/// Activate an account from the emailed link
#[utoipa::path(
    get,
    path = "/api/activate/{uidb64}/{token}/",
    params(
        ("uidb64" = String, Path, description = "Base64 encoded user id"),
        ("token" = String, Path, description = "Activation token")
    ),
    responses(
        (status = 200, description = "Account activated", body = MessageResponse),
        (status = 400, description = "Invalid link or token", body = MessageResponse)
    ),
    tag = "Auth"
)]
pub async fn activate(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let response = match AuthService::activate(&state, &uidb64, &token).await? {
        ActivationOutcome::Activated => ApiSuccess(
            MessageResponse::new("Account successfully activated."),
            StatusCode::OK,
        ),
        ActivationOutcome::InvalidLink => ApiSuccess(
            MessageResponse::new("Invalid activation link."),
            StatusCode::BAD_REQUEST,
        ),
        ActivationOutcome::InvalidToken => ApiSuccess(
            MessageResponse::new("Invalid or expired token."),
            StatusCode::BAD_REQUEST,
        ),
    };
    Ok(response)
}

/// Log in and receive the token cookies
#[utoipa::path(
    post,
    path = "/api/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, cookies set", body = LoginResponse),
        (status = 400, description = "Invalid credentials or inactive account", body = DetailResponse)
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, tokens) = AuthService::login(&state, payload).await?;
    let secure = !state.config.debug;

    cookies.add(auth_cookie(ACCESS_COOKIE, tokens.access, state.config.access_token_ttl_secs, secure));
    cookies.add(auth_cookie(REFRESH_COOKIE, tokens.refresh, state.config.refresh_token_ttl_secs, secure));

    Ok(ApiSuccess(
        LoginResponse {
            detail: "Login successful".to_string(),
            user: LoginUser {
                id: user.id,
                username: user.email,
            },
        },
        StatusCode::OK,
    ))
}

/// Log out: blacklist the tokens and clear the cookies
#[utoipa::path(
    post,
    path = "/api/logout/",
    responses(
        (status = 200, description = "Logged out", body = DetailResponse),
        (status = 400, description = "Refresh token missing or invalid", body = DetailResponse)
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
    let refresh = cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::BadRequest("Refresh token not found.".to_string()))?;
    let access = cookies.get(ACCESS_COOKIE).map(|c| c.value().to_string());

    AuthService::logout(&state, &refresh, access.as_deref()).await?;

    cookies.remove(expired_cookie(ACCESS_COOKIE));
    cookies.remove(expired_cookie(REFRESH_COOKIE));

    Ok(ApiSuccess(
        DetailResponse::new("Logout successful! All tokens will be deleted. Refresh token is now invalid."),
        StatusCode::OK,
    ))
}

/// Issue a new access token from the refresh cookie
#[utoipa::path(
    post,
    path = "/api/token/refresh/",
    responses(
        (status = 200, description = "Access token refreshed", body = RefreshResponse),
        (status = 401, description = "Refresh token missing or invalid", body = DetailResponse)
    ),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    cookies: Cookies,
) -> Result<impl IntoResponse, AppError> {
    let refresh = cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Unauthorized("Refresh token not found.".to_string()))?;

    let access = AuthService::refresh_access(&state, &refresh).await?;
    cookies.add(auth_cookie(
        ACCESS_COOKIE,
        access.clone(),
        state.config.access_token_ttl_secs,
        !state.config.debug,
    ));

    Ok(ApiSuccess(
        RefreshResponse {
            detail: "Token refreshed".to_string(),
            access,
        },
        StatusCode::OK,
    ))
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/api/password_reset/",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Reset email sent if the account exists", body = DetailResponse),
        (status = 400, description = "Invalid email")
    ),
    tag = "Auth"
)]
pub async fn password_reset(
    State(state): State<AppState>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    AuthService::request_password_reset(&state, &payload.email).await?;

    Ok(ApiSuccess(
        DetailResponse::new("An email has been sent to reset your password."),
        StatusCode::OK,
    ))
}

/// Set a new password from the emailed link
#[utoipa::path(
    post,
    path = "/api/password_confirm/{uidb64}/{token}/",
    params(
        ("uidb64" = String, Path, description = "Base64 encoded user id"),
        ("token" = String, Path, description = "Password reset token")
    ),
    request_body = PasswordConfirmRequest,
    responses(
        (status = 200, description = "Password changed", body = DetailResponse),
        (status = 400, description = "Mismatch or invalid link")
    ),
    tag = "Auth"
)]
pub async fn password_confirm(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
    Json(payload): Json<PasswordConfirmRequest>,
) -> Result<impl IntoResponse, AppError> {
    AuthService::confirm_password_reset(&state, &uidb64, &token, payload).await?;

    Ok(ApiSuccess(
        DetailResponse::new("Your Password has been successfully reset."),
        StatusCode::OK,
    ))
}
