use crate::modules::auth::model::User;
use anyhow::Result;
use redis::AsyncCommands;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, email, username, password_hash, is_active, is_staff, is_superuser, last_login, date_joined";

pub struct NewUser<'a> {
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub struct AuthRepository;

impl AuthRepository {
    pub async fn create_user<'e, E>(executor: E, user: NewUser<'_>) -> Result<User>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, username, password_hash, is_active, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.email)
        .bind(user.username)
        .bind(user.password_hash)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    /// Case-insensitive lookup.
    pub async fn find_user_by_email<'e, E>(executor: E, email: &str) -> Result<Option<User>>
    where
        E: PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    pub async fn find_user_by_id(pool: &PgPool, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(user)
    }

    pub async fn username_exists<'e, E>(executor: E, username: &str) -> Result<bool>
    where
        E: PgExecutor<'e>,
    {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
            .bind(username)
            .fetch_one(executor)
            .await?;

        Ok(exists)
    }

    pub async fn activate_user(pool: &PgPool, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET is_active = TRUE WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete_user(pool: &PgPool, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn update_password(pool: &PgPool, id: i64, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_login(pool: &PgPool, id: i64) -> Result<()> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Name of the unique constraint an insert tripped over, if that is why it failed.
    pub fn violated_unique_constraint(err: &anyhow::Error) -> Option<String> {
        let db_err = err.downcast_ref::<sqlx::Error>()?.as_database_error()?;
        if !db_err.is_unique_violation() {
            return None;
        }
        Some(db_err.constraint().unwrap_or_default().to_string())
    }

    fn blacklist_key(jti: Uuid) -> String {
        format!("blacklisted_token:{}", jti)
    }

    pub async fn blacklist_token(
        redis: &mut redis::aio::ConnectionManager,
        jti: Uuid,
        ttl_seconds: u64,
    ) -> Result<()> {
        let _: () = redis.set_ex(Self::blacklist_key(jti), "blocked", ttl_seconds).await?;
        Ok(())
    }

    pub async fn is_blacklisted(
        redis: &mut redis::aio::ConnectionManager,
        jti: Uuid,
    ) -> Result<bool> {
        let exists: bool = redis.exists(Self::blacklist_key(jti)).await?;
        Ok(exists)
    }
}
