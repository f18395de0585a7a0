// src/auth/firebase.rs
//! Firebase ID token verification for company and candidate accounts.

use anyhow::Result;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::app_log;

const FIREBASE_KEYS_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirebaseUser {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FirebaseClaims {
    pub aud: String, // Firebase project ID
    pub iss: String, // Firebase issuer
    pub sub: String, // User ID (uid)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
    pub exp: usize,
    pub iat: usize,
}

impl From<FirebaseClaims> for FirebaseUser {
    fn from(claims: FirebaseClaims) -> Self {
        Self {
            uid: claims.sub,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
            email_verified: claims.email_verified,
        }
    }
}

pub struct AuthConfig {
    pub project_id: Option<String>,
    pub firebase_keys: HashMap<String, String>, // kid -> public key
}

impl AuthConfig {
    pub fn new(project_id: Option<String>) -> Self {
        Self {
            project_id,
            firebase_keys: HashMap::new(),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.project_id.is_some()
    }

    /// Fetch Firebase public keys for JWT verification
    pub async fn update_firebase_keys(&mut self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        let response = reqwest::get(FIREBASE_KEYS_URL).await?.error_for_status()?;
        let keys: HashMap<String, String> = response.json().await?;

        app_log!(info, "Updated {} Firebase public keys", keys.len());
        self.firebase_keys = keys;

        Ok(())
    }

    pub fn verify_token(&self, token: &str) -> Result<FirebaseUser> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Firebase sign-in is not configured"))?;

        let header = jsonwebtoken::decode_header(token)?;
        let kid = header
            .kid
            .ok_or_else(|| anyhow::anyhow!("Missing kid in token header"))?;

        let public_key = self
            .firebase_keys
            .get(&kid)
            .ok_or_else(|| anyhow::anyhow!("Unknown key ID: {}", kid))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("https://securetoken.google.com/{}", project_id)]);

        let decoding_key = DecodingKey::from_rsa_pem(public_key.as_bytes())?;
        let token_data = decode::<FirebaseClaims>(token, &decoding_key, &validation)?;

        Ok(token_data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_rejects_tokens() {
        let config = AuthConfig::disabled();
        assert!(!config.is_enabled());
        assert!(config.verify_token("a.b.c").is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        let config = AuthConfig::new(Some("moltin-test".into()));
        assert!(config.verify_token("not-a-jwt").is_err());
    }

    #[tokio::test]
    async fn test_disabled_config_skips_key_fetch() {
        let mut config = AuthConfig::disabled();
        config.update_firebase_keys().await.unwrap();
        assert!(config.firebase_keys.is_empty());
    }
}
