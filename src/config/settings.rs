use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::config::env::{self, EnvKey};
use crate::modules::content::model::Resolution;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
    pub from_email: String,
}

impl EmailConfig {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct SuperuserConfig {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub secret_key: String,
    pub debug: bool,
    pub allowed_hosts: Vec<String>,
    pub csrf_trusted_origins: Vec<String>,
    pub cors_allowed_origins: Vec<String>,
    pub database_url: String,
    pub db_wait_attempts: u32,
    pub run_migrations: bool,
    pub redis_url: String,
    pub cache_url: String,
    pub superuser: Option<SuperuserConfig>,
    pub email: EmailConfig,
    pub frontend_activation_url: String,
    pub frontend_password_reset_url: String,
    pub access_token_ttl_secs: u64,
    pub refresh_token_ttl_secs: u64,
    pub password_reset_timeout_secs: u64,
    pub video_cache_ttl_secs: u64,
    pub media_root: PathBuf,
    pub hls_resolutions: Vec<Resolution>,
    pub ffmpeg_bin: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let secret_key = env::get_opt(EnvKey::SecretKey)
            .ok_or(ConfigError::Missing(EnvKey::SecretKey.as_str()))?;

        let database_url = match env::get_opt(EnvKey::DatabaseUrl) {
            Some(url) => url,
            None => database_url_from_parts(
                &env::get_or(EnvKey::DbHost, "localhost"),
                env::get_parsed(EnvKey::DbPort, 5432)?,
                &env::get_or(EnvKey::DbUser, "postgres"),
                &env::get_or(EnvKey::DbPassword, ""),
                &env::get_or(EnvKey::DbName, "videoflix"),
            )?,
        };

        let redis_url = format!(
            "redis://{}:{}/{}",
            env::get_or(EnvKey::RedisHost, "localhost"),
            env::get_parsed::<u16>(EnvKey::RedisPort, 6379)?,
            env::get_parsed::<u32>(EnvKey::RedisDb, 0)?,
        );
        let cache_url = env::get_opt(EnvKey::RedisLocation).unwrap_or_else(|| redis_url.clone());

        let hls_resolutions = parse_resolutions(&env::get_or(EnvKey::HlsResolutions, "480p,720p,1080p"))?;

        let superuser = match (
            env::get_opt(EnvKey::SuperuserUsername),
            env::get_opt(EnvKey::SuperuserPassword),
            env::get_opt(EnvKey::SuperuserEmail),
        ) {
            (Some(username), Some(password), Some(email)) => Some(SuperuserConfig {
                username,
                password,
                email,
            }),
            _ => None,
        };

        let email_user = env::get_or(EnvKey::EmailHostUser, "");
        let email = EmailConfig {
            host: env::get_or(EnvKey::EmailHost, ""),
            port: env::get_parsed(EnvKey::EmailPort, 587)?,
            from_email: env::get_opt(EnvKey::DefaultFromEmail)
                .unwrap_or_else(|| if email_user.is_empty() { "webmaster@localhost".to_string() } else { email_user.clone() }),
            username: email_user,
            password: env::get_or(EnvKey::EmailHostPassword, ""),
            use_tls: env::get_flag(EnvKey::EmailUseTls, true),
        };

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 8000)?,
            secret_key,
            debug: env::get_flag(EnvKey::Debug, false),
            allowed_hosts: env::get_list(EnvKey::AllowedHosts, "localhost,127.0.0.1"),
            csrf_trusted_origins: env::get_list(EnvKey::CsrfTrustedOrigins, ""),
            cors_allowed_origins: env::get_list(EnvKey::CorsAllowedOrigins, ""),
            database_url,
            db_wait_attempts: env::get_parsed(EnvKey::DbWaitAttempts, 30)?,
            run_migrations: env::get_flag(EnvKey::RunMigrations, false),
            redis_url,
            cache_url,
            superuser,
            email,
            frontend_activation_url: env::get_or(
                EnvKey::FrontendActivationUrl,
                "http://localhost:4200/pages/auth/activate.html",
            ),
            frontend_password_reset_url: env::get_or(
                EnvKey::FrontendPasswordResetUrl,
                "http://localhost:4200/pages/auth/confirm_password.html",
            ),
            access_token_ttl_secs: env::get_parsed(EnvKey::AccessTokenLifetime, 5 * 60)?,
            refresh_token_ttl_secs: env::get_parsed(EnvKey::RefreshTokenLifetime, 24 * 60 * 60)?,
            password_reset_timeout_secs: env::get_parsed(EnvKey::PasswordResetTimeout, 3 * 24 * 60 * 60)?,
            video_cache_ttl_secs: env::get_parsed(EnvKey::VideoCacheTtl, 15 * 60)?,
            media_root: PathBuf::from(env::get_or(EnvKey::MediaRoot, "media")),
            hls_resolutions,
            ffmpeg_bin: env::get_or(EnvKey::FfmpegBin, "ffmpeg"),
        })
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        // Port is irrelevant for the check.
        let host = match host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => host,
        };
        self.allowed_hosts.iter().any(|allowed| {
            allowed == "*"
                || allowed.eq_ignore_ascii_case(host)
                || allowed
                    .strip_prefix('.')
                    .is_some_and(|suffix| {
                        host.eq_ignore_ascii_case(suffix)
                            || host.to_ascii_lowercase().ends_with(&format!(".{}", suffix.to_ascii_lowercase()))
                    })
        })
    }

    pub fn is_trusted_origin(&self, origin: &str) -> bool {
        self.csrf_trusted_origins
            .iter()
            .chain(self.cors_allowed_origins.iter())
            .any(|trusted| trusted.trim_end_matches('/') == origin.trim_end_matches('/'))
    }
}

fn database_url_from_parts(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    name: &str,
) -> Result<String, ConfigError> {
    let invalid = |_| ConfigError::Invalid(EnvKey::DbHost.as_str(), host.to_string());

    let mut url = Url::parse(&format!("postgres://{}", host))
        .map_err(|e| ConfigError::Invalid(EnvKey::DbHost.as_str(), e.to_string()))?;
    url.set_port(Some(port)).map_err(invalid)?;
    url.set_username(user).map_err(invalid)?;
    if !password.is_empty() {
        url.set_password(Some(password)).map_err(invalid)?;
    }
    url.set_path(name);

    Ok(url.to_string())
}

fn parse_resolutions(value: &str) -> Result<Vec<Resolution>, ConfigError> {
    let resolutions = env::split_list(value)
        .iter()
        .map(|s| {
            s.parse::<Resolution>()
                .map_err(|_| ConfigError::Invalid(EnvKey::HlsResolutions.as_str(), s.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if resolutions.is_empty() {
        return Err(ConfigError::Invalid(EnvKey::HlsResolutions.as_str(), value.to_string()));
    }
    Ok(resolutions)
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        Self {
            server_port: 8000,
            secret_key: "test-secret-key".to_string(),
            debug: false,
            allowed_hosts: vec!["*".to_string()],
            csrf_trusted_origins: vec!["http://localhost:4200".to_string()],
            cors_allowed_origins: vec![],
            database_url: "postgres://postgres@127.0.0.1:1/videoflix".to_string(),
            db_wait_attempts: 1,
            run_migrations: false,
            redis_url: "redis://127.0.0.1:1/0".to_string(),
            cache_url: "redis://127.0.0.1:1/1".to_string(),
            superuser: None,
            email: EmailConfig {
                host: String::new(),
                port: 587,
                username: String::new(),
                password: String::new(),
                use_tls: true,
                from_email: "noreply@videoflix.test".to_string(),
            },
            frontend_activation_url: "http://localhost:4200/activate".to_string(),
            frontend_password_reset_url: "http://localhost:4200/reset".to_string(),
            access_token_ttl_secs: 300,
            refresh_token_ttl_secs: 86400,
            password_reset_timeout_secs: 3600,
            video_cache_ttl_secs: 60,
            media_root: PathBuf::from("media"),
            hls_resolutions: vec![Resolution::P480, Resolution::P720, Resolution::P1080],
            ffmpeg_bin: "ffmpeg".to_string(),
        }
    }
}
