use super::dto::{LoginRequest, PasswordConfirmRequest, RegisterRequest};
use super::emails;
use super::model::{username_base, username_candidate, User};
use super::repository::{AuthRepository, NewUser};
use super::tokens::{self, AccountTokenGenerator, TokenClaims, TokenType};
use crate::common::error::{field_error, AppError};
use crate::common::security;
use crate::state::AppState;
use anyhow::{anyhow, Result};
use jsonwebtoken::get_current_timestamp;
use sqlx::PgPool;
use tracing::{error, info, warn};
use validator::Validate;

const EMAIL_UNIQUE_INDEX: &str = "users_email_lower_idx";
const USERNAME_ATTEMPTS: usize = 5;

/// Access + refresh pair issued on login.
pub struct IssuedTokens {
    pub access: String,
    pub refresh: String,
}

pub enum ActivationOutcome {
    Activated,
    InvalidLink,
    InvalidToken,
}

pub struct AuthService;

impl AuthService {
    fn activation_tokens(state: &AppState) -> AccountTokenGenerator {
        AccountTokenGenerator::activation(&state.config.secret_key, state.config.password_reset_timeout_secs)
    }

    fn reset_tokens(state: &AppState) -> AccountTokenGenerator {
        AccountTokenGenerator::password_reset(&state.config.secret_key, state.config.password_reset_timeout_secs)
    }

    async fn generate_username(pool: &PgPool, email: &str) -> Result<String> {
        let base = username_base(email);
        let mut n = 1;
        loop {
            let candidate = username_candidate(&base, n);
            if !AuthRepository::username_exists(pool, &candidate).await? {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    fn email_taken() -> AppError {
        AppError::Validation(field_error("email", "Please check your entries and try again."))
    }

    /// Inserts an inactive account. A concurrent registration of the same email
    /// surfaces as the usual field error; a lost username race picks the next name.
    async fn insert_inactive_user(state: &AppState, email: &str, password_hash: &str) -> Result<User, AppError> {
        for _ in 0..USERNAME_ATTEMPTS {
            let username = Self::generate_username(&state.db, email).await?;
            let created = AuthRepository::create_user(
                &state.db,
                NewUser {
                    email,
                    username: &username,
                    password_hash,
                    is_active: false,
                    is_staff: false,
                    is_superuser: false,
                },
            )
            .await;

            match created {
                Ok(user) => return Ok(user),
                Err(e) => match AuthRepository::violated_unique_constraint(&e) {
                    Some(constraint) if constraint == EMAIL_UNIQUE_INDEX => return Err(Self::email_taken()),
                    Some(_) => warn!("Username {} was taken concurrently, retrying", username),
                    None => return Err(e.into()),
                },
            }
        }
        Err(AppError::Internal(anyhow!("Could not allocate a username for {}", email)))
    }

    /// Creates an inactive account and mails the activation link.
    /// The account is removed again if the email cannot be delivered.
    pub async fn register(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
        req.validate()?;

        if req.password != req.confirmed_password {
            return Err(AppError::Validation(field_error(
                "confirmed_password",
                "Passwords do not match.",
            )));
        }

        if AuthRepository::find_user_by_email(&state.db, &req.email).await?.is_some() {
            return Err(Self::email_taken());
        }

        let password_hash = security::hash_password(&req.password)?;
        let user = Self::insert_inactive_user(state, &req.email, &password_hash).await?;

        let uid = tokens::encode_uid(user.id);
        let token = Self::activation_tokens(state).make_token(&user, get_current_timestamp())?;
        let link = emails::frontend_link(&state.config.frontend_activation_url, &uid, &token);
        let email = emails::activation_email(&user.email, &user.username, &link);

        // No transaction is held open across the SMTP round-trip.
        if let Err(e) = state.mailer.send(&email).await {
            error!("Activation email to {} failed: {}", user.email, e);
            AuthRepository::delete_user(&state.db, user.id).await?;
            return Err(AppError::ServiceUnavailable(
                "Activation email could not be sent. Please try again later.".to_string(),
            ));
        }

        info!("Registered user {} ({})", user.id, user.email);
        Ok(user)
    }

    pub async fn activate(state: &AppState, uidb64: &str, token: &str) -> Result<ActivationOutcome> {
        let Some(user_id) = tokens::decode_uid(uidb64) else {
            return Ok(ActivationOutcome::InvalidLink);
        };
        let Some(user) = AuthRepository::find_user_by_id(&state.db, user_id).await? else {
            return Ok(ActivationOutcome::InvalidLink);
        };

        if !Self::activation_tokens(state).check_token(&user, token, get_current_timestamp()) {
            return Ok(ActivationOutcome::InvalidToken);
        }

        if !user.is_active {
            AuthRepository::activate_user(&state.db, user.id).await?;
            info!("Activated user {}", user.id);
        }

        Ok(ActivationOutcome::Activated)
    }

    pub async fn login(state: &AppState, req: LoginRequest) -> Result<(User, IssuedTokens), AppError> {
        let (Some(email), Some(password)) = (
            req.email.filter(|e| !e.is_empty()),
            req.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::BadRequest("Email and password are required.".to_string()));
        };

        let invalid = || AppError::BadRequest("No active account found with the given credentials.".to_string());

        let user = AuthRepository::find_user_by_email(&state.db, &email)
            .await?
            .ok_or_else(invalid)?;

        security::verify_password(&password, &user.password_hash).map_err(|_| invalid())?;

        if !user.is_active {
            return Err(AppError::BadRequest("Account is not active.".to_string()));
        }

        let tokens = Self::issue_tokens(state, user.id)?;
        AuthRepository::touch_last_login(&state.db, user.id).await?;

        Ok((user, tokens))
    }

    fn issue_tokens(state: &AppState, user_id: i64) -> Result<IssuedTokens> {
        let now = get_current_timestamp();
        let secret = &state.config.secret_key;
        let (access, _) = tokens::issue_jwt(secret, user_id, TokenType::Access, state.config.access_token_ttl_secs, now)?;
        let (refresh, _) = tokens::issue_jwt(secret, user_id, TokenType::Refresh, state.config.refresh_token_ttl_secs, now)?;
        Ok(IssuedTokens { access, refresh })
    }

    async fn validate_refresh(state: &AppState, refresh_token: &str) -> Result<TokenClaims, AppError> {
        let claims = tokens::decode_jwt(&state.config.secret_key, refresh_token, TokenType::Refresh)
            .map_err(|_| AppError::Unauthorized("Refresh token invalid or expired.".to_string()))?;

        let mut redis = state.redis.get_conn().await?;
        if AuthRepository::is_blacklisted(&mut redis, claims.jti).await? {
            return Err(AppError::Unauthorized("Refresh token invalid or expired.".to_string()));
        }
        Ok(claims)
    }

    /// Issues a new access token for a valid, non-blacklisted refresh token.
    pub async fn refresh_access(state: &AppState, refresh_token: &str) -> Result<String, AppError> {
        let claims = Self::validate_refresh(state, refresh_token).await?;
        let user_id = claims.user_id()?;

        let user = AuthRepository::find_user_by_id(&state.db, user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("User not found or inactive.".to_string()))?;

        let (access, _) = tokens::issue_jwt(
            &state.config.secret_key,
            user.id,
            TokenType::Access,
            state.config.access_token_ttl_secs,
            get_current_timestamp(),
        )?;
        Ok(access)
    }

    /// Blacklists the refresh token and, when still valid, the access token.
    pub async fn logout(state: &AppState, refresh_token: &str, access_token: Option<&str>) -> Result<(), AppError> {
        let now = get_current_timestamp();
        let refresh = tokens::decode_jwt(&state.config.secret_key, refresh_token, TokenType::Refresh)
            .map_err(|_| AppError::BadRequest("Refresh token invalid or expired.".to_string()))?;

        let mut redis = state.redis.get_conn().await?;
        AuthRepository::blacklist_token(&mut redis, refresh.jti, refresh.remaining_secs(now)).await?;

        if let Some(access) = access_token
            .and_then(|t| tokens::decode_jwt(&state.config.secret_key, t, TokenType::Access).ok())
        {
            AuthRepository::blacklist_token(&mut redis, access.jti, access.remaining_secs(now)).await?;
        }

        info!("User {} logged out", refresh.sub);
        Ok(())
    }

    /// Sends a reset link if an active account exists. Never reveals whether it does.
    pub async fn request_password_reset(state: &AppState, email: &str) -> Result<()> {
        let Some(user) = AuthRepository::find_user_by_email(&state.db, email).await? else {
            info!("Password reset requested for unknown email");
            return Ok(());
        };
        if !user.is_active {
            info!("Password reset requested for inactive user {}", user.id);
            return Ok(());
        }

        let uid = tokens::encode_uid(user.id);
        let token = Self::reset_tokens(state).make_token(&user, get_current_timestamp())?;
        let link = emails::frontend_link(&state.config.frontend_password_reset_url, &uid, &token);
        let email = emails::password_reset_email(&user.email, &user.username, &link);

        if let Err(e) = state.mailer.send(&email).await {
            warn!("Password reset email to user {} failed: {}", user.id, e);
        }
        Ok(())
    }

    pub async fn confirm_password_reset(
        state: &AppState,
        uidb64: &str,
        token: &str,
        req: PasswordConfirmRequest,
    ) -> Result<(), AppError> {
        req.validate()?;
        if req.new_password != req.confirm_password {
            return Err(AppError::Validation(field_error("confirm_password", "Passwords do not match.")));
        }

        let invalid = || AppError::BadRequest("Invalid or expired password reset link.".to_string());

        let user_id = tokens::decode_uid(uidb64).ok_or_else(invalid)?;
        let user = AuthRepository::find_user_by_id(&state.db, user_id)
            .await?
            .ok_or_else(invalid)?;

        if !Self::reset_tokens(state).check_token(&user, token, get_current_timestamp()) {
            return Err(invalid());
        }

        let password_hash = security::hash_password(&req.new_password)?;
        AuthRepository::update_password(&state.db, user.id, &password_hash).await?;
        info!("Password reset for user {}", user.id);
        Ok(())
    }

    /// Idempotent creation of the bootstrap staff account.
    pub async fn ensure_superuser(state: &AppState, username: &str, email: &str, password: &str) -> Result<bool> {
        if AuthRepository::find_user_by_email(&state.db, email).await?.is_some() {
            info!("Superuser {} already exists", email);
            return Ok(false);
        }

        let mut conn = state.db.acquire().await?;
        if AuthRepository::username_exists(&mut *conn, username).await? {
            return Err(anyhow!("Username '{}' is taken by another account", username));
        }

        let password_hash = security::hash_password(password)?;
        AuthRepository::create_user(
            &mut *conn,
            NewUser {
                email,
                username,
                password_hash: &password_hash,
                is_active: true,
                is_staff: true,
                is_superuser: true,
            },
        )
        .await?;

        info!("Created superuser {}", email);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AppConfig;

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
            confirmed_password: "s3cret-pass".to_string(),
        }
    }

    async fn user_count(db: &PgPool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(db).await.unwrap()
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn undeliverable_activation_leaves_no_account(db: PgPool) {
        // The test config has no EMAIL_HOST, so every send fails.
        let state = AppState::for_tests_with_pool(AppConfig::for_tests(), db.clone());

        let first = AuthService::register(&state, register_request("anna@example.com")).await;
        assert!(matches!(first, Err(AppError::ServiceUnavailable(_))));
        assert_eq!(user_count(&db).await, 0);

        let again = AuthService::register(&state, register_request("anna@example.com")).await;
        assert!(matches!(again, Err(AppError::ServiceUnavailable(_))));
        assert_eq!(user_count(&db).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn duplicate_email_insert_is_a_field_error(db: PgPool) {
        let state = AppState::for_tests_with_pool(AppConfig::for_tests(), db.clone());
        let hash = security::hash_password("s3cret-pass").unwrap();

        AuthService::insert_inactive_user(&state, "bob@example.com", &hash).await.unwrap();
        // Different case, same address: only the unique index can catch it after the lookup passed.
        let second = AuthService::insert_inactive_user(&state, "BOB@example.com", &hash).await;

        match second {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields["email"], vec!["Please check your entries and try again."]);
            }
            other => panic!("expected email field error, got {:?}", other.map(|u| u.id)),
        }
        assert_eq!(user_count(&db).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "needs PostgreSQL via DATABASE_URL"]
    async fn activation_link_enables_login(db: PgPool) {
        let state = AppState::for_tests_with_pool(AppConfig::for_tests(), db.clone());
        let hash = security::hash_password("s3cret-pass").unwrap();
        let user = AuthService::insert_inactive_user(&state, "cleo@example.com", &hash).await.unwrap();

        let login = || LoginRequest {
            email: Some("cleo@example.com".to_string()),
            password: Some("s3cret-pass".to_string()),
        };
        assert!(matches!(
            AuthService::login(&state, login()).await,
            Err(AppError::BadRequest(m)) if m == "Account is not active."
        ));

        let uid = tokens::encode_uid(user.id);
        let outcome = AuthService::activate(&state, &uid, "not-a-token").await.unwrap();
        assert!(matches!(outcome, ActivationOutcome::InvalidToken));

        let token = AuthService::activation_tokens(&state)
            .make_token(&user, get_current_timestamp())
            .unwrap();
        let outcome = AuthService::activate(&state, &uid, &token).await.unwrap();
        assert!(matches!(outcome, ActivationOutcome::Activated));

        let (logged_in, issued) = AuthService::login(&state, login()).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        let claims = tokens::decode_jwt(&state.config.secret_key, &issued.refresh, TokenType::Refresh).unwrap();
        assert_eq!(claims.user_id().unwrap(), user.id);

        let bad_password = LoginRequest {
            email: Some("cleo@example.com".to_string()),
            password: Some("wrong".to_string()),
        };
        assert!(matches!(AuthService::login(&state, bad_password).await, Err(AppError::BadRequest(_))));
    }
}
