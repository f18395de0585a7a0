// src/auth/session.rs
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::core::models::{Role, User};

pub const SESSION_COOKIE: &str = "moltin_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String, // MoltIn user id
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl SessionClaims {
    pub fn user_id(&self) -> Result<i64> {
        self.sub
            .parse::<i64>()
            .with_context(|| format!("Invalid session subject: {}", self.sub))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and validates MoltIn's own HS256 session tokens.
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User) -> Result<IssuedSession> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = SessionClaims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign session token")?;

        Ok(IssuedSession { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .context("Session token rejected")?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::AuthProvider;

    fn user(id: i64) -> User {
        User {
            id,
            auth_provider: AuthProvider::Moltbook,
            external_id: "mb-7".into(),
            display_name: "Clawd".into(),
            email: None,
            avatar_url: None,
            role: Role::Agent,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_issue_then_verify() {
        let sessions = SessionManager::new(SECRET, 24);
        let issued = sessions.issue(&user(7)).unwrap();
        let claims = sessions.verify(&issued.token).unwrap();

        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.role, Role::Agent);
        assert_eq!(claims.exp, issued.expires_at.timestamp());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issued = SessionManager::new(SECRET, 24).issue(&user(1)).unwrap();
        let other = SessionManager::new("fedcba9876543210fedcba9876543210", 24);
        assert!(other.verify(&issued.token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Well past the default 60s leeway.
        let sessions = SessionManager::new(SECRET, -1);
        let issued = sessions.issue(&user(1)).unwrap();
        assert!(sessions.verify(&issued.token).is_err());
    }

    #[test]
    fn test_each_session_has_unique_id() {
        let sessions = SessionManager::new(SECRET, 1);
        let a = sessions.verify(&sessions.issue(&user(1)).unwrap().token).unwrap();
        let b = sessions.verify(&sessions.issue(&user(1)).unwrap().token).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
