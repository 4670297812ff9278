use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
    #[serde(default)]
    pub jti: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

fn sign(claims: &Claims, config: &Config) -> AppResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign {:?} token: {}", claims.token_type, e)))
}

pub fn create_access_token(user_id: Uuid, email: &str, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    sign(
        &Claims {
            sub: user_id,
            email: email.to_string(),
            exp: (now + Duration::seconds(config.jwt_access_ttl_secs)).timestamp(),
            iat: now.timestamp(),
            token_type: TokenType::Access,
            jti: None,
        },
        config,
    )
}

pub fn create_refresh_token(user_id: Uuid, email: &str, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    sign(
        &Claims {
            sub: user_id,
            email: email.to_string(),
            exp: (now + Duration::seconds(config.jwt_refresh_ttl_secs)).timestamp(),
            iat: now.timestamp(),
            token_type: TokenType::Refresh,
            // unique per token so rotated hashes never collide
            jti: Some(Uuid::new_v4()),
        },
        config,
    )
}

pub fn create_token_pair(user_id: Uuid, email: &str, config: &Config) -> AppResult<TokenPair> {
    let access_token = create_access_token(user_id, email, config)?;
    let refresh_token = create_refresh_token(user_id, email, config)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: config.jwt_access_ttl_secs,
    })
}

/// Compute SHA-256 hash of a raw token string, returned as lowercase hex.
pub fn hash_token(raw_token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn verify_token(token: &str, config: &Config) -> AppResult<TokenData<Claims>> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_round_trip() {
        let config = Config::for_tests();
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "a@b.com", &config).unwrap();
        let data = verify_token(&token, &config).unwrap();
        assert_eq!(data.claims.sub, user_id);
        assert_eq!(data.claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_refresh_tokens_are_unique() {
        let config = Config::for_tests();
        let user_id = Uuid::new_v4();
        let a = create_refresh_token(user_id, "a@b.com", &config).unwrap();
        let b = create_refresh_token(user_id, "a@b.com", &config).unwrap();
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = create_access_token(Uuid::new_v4(), "a@b.com", &config).unwrap();
        let other = Config {
            jwt_secret: "another-secret".into(),
            ..Config::for_tests()
        };
        assert!(matches!(verify_token(&token, &other), Err(AppError::Unauthorized)));
    }

    #[test]
    fn test_hash_token_deterministic() {
        let h1 = hash_token("test-refresh-token-value");
        let h2 = hash_token("test-refresh-token-value");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64);
    }
}
