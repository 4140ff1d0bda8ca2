use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

/// Authenticated user attached to the request by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Slug of the email local part; falls back to `user`.
pub fn username_base(email: &str) -> String {
    let local = email.split('@').next().unwrap_or("");
    let mut slug = String::new();
    for c in local.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            slug.push(c);
        } else if (c == '-' || c == '.' || c == '+' || c.is_whitespace()) && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();

    if slug.is_empty() { "user".to_string() } else { slug }
}

/// `base`, `base2`, `base3`, ... for the n-th candidate (1-based).
pub fn username_candidate(base: &str, n: u32) -> String {
    if n <= 1 { base.to_string() } else { format!("{}{}", base, n) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_from_email() {
        assert_eq!(username_base("Anna.Schmidt@example.com"), "anna-schmidt");
        assert_eq!(username_base("bob+news@example.com"), "bob-news");
        assert_eq!(username_base("üö@example.com"), "user");
        assert_eq!(username_base("@example.com"), "user");
        assert_eq!(username_base(""), "user");
    }

    #[test]
    fn candidates_get_numeric_suffix() {
        assert_eq!(username_candidate("anna", 1), "anna");
        assert_eq!(username_candidate("anna", 2), "anna2");
        assert_eq!(username_candidate("anna", 3), "anna3");
    }
}
