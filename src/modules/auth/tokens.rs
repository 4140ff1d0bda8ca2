//! Signed tokens used by the auth flows.
//!
//! * `uidb64`: URL-safe base64 of the decimal user id, as sent in email links.
//! * Account tokens (activation, password reset): `<base36 issued-at>-<hmac>`.
//!   The HMAC covers the user's id, password hash, last login and email, so a
//!   token stops working once any of those change.
//! * JWTs for the `access_token` / `refresh_token` cookies.

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use super::model::User;

type HmacSha256 = Hmac<Sha256>;

pub fn encode_uid(user_id: i64) -> String {
    URL_SAFE_NO_PAD.encode(user_id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64.trim_end_matches('=')).ok()?;
    String::from_utf8(bytes).ok()?.parse().ok()
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(s: &str) -> Option<u64> {
    if s.is_empty() || s.len() > 13 {
        return None;
    }
    u64::from_str_radix(s, 36).ok()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Clone)]
pub struct AccountTokenGenerator {
    key_salt: &'static str,
    secret: String,
    timeout_secs: u64,
}

impl AccountTokenGenerator {
    pub fn activation(secret: &str, timeout_secs: u64) -> Self {
        Self {
            key_salt: "videoflix.account-activation",
            secret: secret.to_string(),
            timeout_secs,
        }
    }

    pub fn password_reset(secret: &str, timeout_secs: u64) -> Self {
        Self {
            key_salt: "videoflix.password-reset",
            secret: secret.to_string(),
            timeout_secs,
        }
    }

    pub fn make_token(&self, user: &User, now: u64) -> Result<String> {
        Ok(format!("{}-{}", to_base36(now), self.hash(user, now)?))
    }

    pub fn check_token(&self, user: &User, token: &str, now: u64) -> bool {
        let Some((ts_b36, hash)) = token.split_once('-') else {
            return false;
        };
        let Some(ts) = from_base36(ts_b36) else {
            return false;
        };

        match self.hash(user, ts) {
            Ok(expected) if constant_time_eq(expected.as_bytes(), hash.as_bytes()) => {}
            _ => return false,
        }

        now.saturating_sub(ts) <= self.timeout_secs
    }

    fn hash(&self, user: &User, timestamp: u64) -> Result<String> {
        let last_login = user
            .last_login
            .map(|t| t.unix_timestamp().to_string())
            .unwrap_or_default();

        let mut mac = HmacSha256::new_from_slice(format!("{}{}", self.key_salt, self.secret).as_bytes())
            .map_err(|e| anyhow!("Invalid HMAC key: {}", e))?;
        mac.update(user.id.to_string().as_bytes());
        mac.update(user.password_hash.as_bytes());
        mac.update(last_login.as_bytes());
        mac.update(timestamp.to_string().as_bytes());
        mac.update(user.email.to_lowercase().as_bytes());

        let digest = hex::encode(mac.finalize().into_bytes());
        // Every other hex digit keeps links short.
        Ok(digest.chars().step_by(2).collect())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub jti: Uuid,
    pub token_type: TokenType,
    pub exp: u64,
    pub iat: u64,
}

impl TokenClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub.parse().map_err(|_| anyhow!("Invalid subject in token"))
    }

    /// Seconds until expiry, at least one so Redis accepts it as a TTL.
    pub fn remaining_secs(&self, now: u64) -> u64 {
        self.exp.saturating_sub(now).max(1)
    }
}

pub fn issue_jwt(secret: &str, user_id: i64, token_type: TokenType, ttl_secs: u64, now: u64) -> Result<(String, TokenClaims)> {
    let claims = TokenClaims {
        sub: user_id.to_string(),
        jti: Uuid::new_v4(),
        token_type,
        exp: now + ttl_secs,
        iat: now,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow!(e.to_string()))?;

    Ok((token, claims))
}

pub fn decode_jwt(secret: &str, token: &str, expected: TokenType) -> Result<TokenClaims> {
    let mut validation = Validation::default();
    validation.leeway = 0;

    let claims = decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?
    .claims;

    if claims.token_type != expected {
        return Err(anyhow!("Token has wrong type"));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::get_current_timestamp;
    use time::OffsetDateTime;

    fn user() -> User {
        User {
            id: 42,
            email: "anna@example.com".to_string(),
            username: "anna".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
            is_active: false,
            is_staff: false,
            is_superuser: false,
            last_login: None,
            date_joined: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn uid_roundtrip_and_garbage() {
        assert_eq!(encode_uid(42), "NDI");
        assert_eq!(decode_uid("NDI"), Some(42));
        assert_eq!(decode_uid("NDI="), Some(42));
        assert_eq!(decode_uid("!!"), None);
        assert_eq!(decode_uid(&URL_SAFE_NO_PAD.encode("abc")), None);
    }

    #[test]
    fn base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(from_base36("10"), Some(36));
        assert_eq!(from_base36(""), None);
    }

    #[test]
    fn account_token_accepts_fresh_token() {
        let generator = AccountTokenGenerator::activation("secret", 3600);
        let token = generator.make_token(&user(), 1_000_000).unwrap();
        assert!(generator.check_token(&user(), &token, 1_000_000 + 3600));
    }

    #[test]
    fn account_token_expires() {
        let generator = AccountTokenGenerator::activation("secret", 3600);
        let token = generator.make_token(&user(), 1_000_000).unwrap();
        assert!(!generator.check_token(&user(), &token, 1_000_000 + 3601));
    }

    #[test]
    fn account_token_dies_when_password_or_login_changes() {
        let generator = AccountTokenGenerator::password_reset("secret", 3600);
        let token = generator.make_token(&user(), 1_000_000).unwrap();

        let mut changed = user();
        changed.password_hash = "$argon2id$other".to_string();
        assert!(!generator.check_token(&changed, &token, 1_000_001));

        let mut logged_in = user();
        logged_in.last_login = Some(OffsetDateTime::from_unix_timestamp(999_999).unwrap());
        assert!(!generator.check_token(&logged_in, &token, 1_000_001));
    }

    #[test]
    fn account_tokens_are_purpose_bound() {
        let activation = AccountTokenGenerator::activation("secret", 3600);
        let reset = AccountTokenGenerator::password_reset("secret", 3600);
        let token = activation.make_token(&user(), 1_000_000).unwrap();
        assert!(!reset.check_token(&user(), &token, 1_000_000));
    }

    #[test]
    fn malformed_account_tokens_are_rejected() {
        let generator = AccountTokenGenerator::activation("secret", 3600);
        assert!(!generator.check_token(&user(), "", 0));
        assert!(!generator.check_token(&user(), "nodash", 0));
        assert!(!generator.check_token(&user(), "zz-abc", 0));
    }

    #[test]
    fn jwt_roundtrip_checks_type() {
        let now = get_current_timestamp();
        let (token, claims) = issue_jwt("secret", 7, TokenType::Refresh, 60, now).unwrap();

        let decoded = decode_jwt("secret", &token, TokenType::Refresh).unwrap();
        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.user_id().unwrap(), 7);

        assert!(decode_jwt("secret", &token, TokenType::Access).is_err());
        assert!(decode_jwt("other-secret", &token, TokenType::Refresh).is_err());
    }

    #[test]
    fn expired_jwt_is_rejected() {
        let now = get_current_timestamp();
        let (token, _) = issue_jwt("secret", 7, TokenType::Access, 10, now - 100).unwrap();
        assert!(decode_jwt("secret", &token, TokenType::Access).is_err());
    }
}
