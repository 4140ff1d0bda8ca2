use std::env;
use std::str::FromStr;

use crate::config::settings::ConfigError;

#[derive(Debug, Clone, Copy)]
pub enum EnvKey {
    ServerPort,
    SecretKey,
    Debug,
    AllowedHosts,
    CsrfTrustedOrigins,
    CorsAllowedOrigins,
    DatabaseUrl,
    DbName,
    DbUser,
    DbPassword,
    DbHost,
    DbPort,
    DbWaitAttempts,
    RunMigrations,
    RedisHost,
    RedisPort,
    RedisDb,
    RedisLocation,
    SuperuserUsername,
    SuperuserPassword,
    SuperuserEmail,
    EmailHost,
    EmailPort,
    EmailHostUser,
    EmailHostPassword,
    EmailUseTls,
    DefaultFromEmail,
    FrontendActivationUrl,
    FrontendPasswordResetUrl,
    AccessTokenLifetime,
    RefreshTokenLifetime,
    PasswordResetTimeout,
    VideoCacheTtl,
    MediaRoot,
    HlsResolutions,
    FfmpegBin,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::SecretKey => "SECRET_KEY",
            EnvKey::Debug => "DEBUG",
            EnvKey::AllowedHosts => "ALLOWED_HOSTS",
            EnvKey::CsrfTrustedOrigins => "CSRF_TRUSTED_ORIGINS",
            EnvKey::CorsAllowedOrigins => "CORS_ALLOWED_ORIGINS",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::DbName => "DB_NAME",
            EnvKey::DbUser => "DB_USER",
            EnvKey::DbPassword => "DB_PASSWORD",
            EnvKey::DbHost => "DB_HOST",
            EnvKey::DbPort => "DB_PORT",
            EnvKey::DbWaitAttempts => "DB_WAIT_ATTEMPTS",
            EnvKey::RunMigrations => "RUN_MIGRATIONS",
            EnvKey::RedisHost => "REDIS_HOST",
            EnvKey::RedisPort => "REDIS_PORT",
            EnvKey::RedisDb => "REDIS_DB",
            EnvKey::RedisLocation => "REDIS_LOCATION",
            EnvKey::SuperuserUsername => "DJANGO_SUPERUSER_USERNAME",
            EnvKey::SuperuserPassword => "DJANGO_SUPERUSER_PASSWORD",
            EnvKey::SuperuserEmail => "DJANGO_SUPERUSER_EMAIL",
            EnvKey::EmailHost => "EMAIL_HOST",
            EnvKey::EmailPort => "EMAIL_PORT",
            EnvKey::EmailHostUser => "EMAIL_HOST_USER",
            EnvKey::EmailHostPassword => "EMAIL_HOST_PASSWORD",
            EnvKey::EmailUseTls => "EMAIL_USE_TLS",
            EnvKey::DefaultFromEmail => "DEFAULT_FROM_EMAIL",
            EnvKey::FrontendActivationUrl => "FRONTEND_ACTIVATION_URL",
            EnvKey::FrontendPasswordResetUrl => "FRONTEND_PASSWORD_RESET_URL",
            EnvKey::AccessTokenLifetime => "ACCESS_TOKEN_LIFETIME_SECS",
            EnvKey::RefreshTokenLifetime => "REFRESH_TOKEN_LIFETIME_SECS",
            EnvKey::PasswordResetTimeout => "PASSWORD_RESET_TIMEOUT_SECS",
            EnvKey::VideoCacheTtl => "VIDEO_CACHE_TTL_SECS",
            EnvKey::MediaRoot => "MEDIA_ROOT",
            EnvKey::HlsResolutions => "HLS_RESOLUTIONS",
            EnvKey::FfmpegBin => "FFMPEG_BIN",
        }
    }
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.trim().is_empty())
}

pub fn get_or(key: EnvKey, default: &str) -> String {
    get_opt(key).unwrap_or_else(|| default.to_string())
}

/// `default` when unset or blank; a value that is present must parse.
pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> Result<T, ConfigError> {
    parse_or(key, get_opt(key), default)
}

pub fn parse_or<T: FromStr>(key: EnvKey, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(val) => val
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key.as_str(), val.clone())),
        None => Ok(default),
    }
}

/// Django-style truthiness: `1`, `true`, `yes`, `on`.
pub fn get_flag(key: EnvKey, default: bool) -> bool {
    match get_opt(key) {
        Some(val) => parse_flag(&val),
        None => default,
    }
}

pub fn get_list(key: EnvKey, default: &str) -> Vec<String> {
    split_list(&get_or(key, default))
}

pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_follow_django_truthiness() {
        assert!(parse_flag("1"));
        assert!(parse_flag("True"));
        assert!(parse_flag(" yes "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn lists_drop_blank_entries() {
        assert_eq!(
            split_list("localhost, 127.0.0.1,,web "),
            vec!["localhost", "127.0.0.1", "web"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn numbers_fall_back_only_when_unset() {
        assert_eq!(parse_or(EnvKey::DbPort, None, 5432u16).unwrap(), 5432);
        assert_eq!(parse_or(EnvKey::DbPort, Some(" 5433 ".to_string()), 5432u16).unwrap(), 5433);

        let err = parse_or(EnvKey::DbPort, Some("abc".to_string()), 5432u16).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("DB_PORT", ref v) if v == "abc"));
        assert!(parse_or(EnvKey::EmailPort, Some("x".to_string()), 587u16).is_err());
    }
}
