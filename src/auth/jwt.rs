//! JWT token generation and validation
//! 访问令牌绑定服务端会话，注销后令牌随会话一同失效

use crate::{config::AppConfig, error::AppError, models::role::RoleName};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// Username
    pub username: String,

    /// Role at login time; permission checks reload it from the database
    pub role: RoleName,

    /// Session ID
    pub sid: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::LoginRequired)
    }

    pub fn session_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sid).map_err(|_| AppError::LoginRequired)
    }
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
}

impl JwtService {
    pub fn new(secret: &Secret<String>, ttl_secs: u64) -> Result<Self, AppError> {
        let secret = secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        })
    }

    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(&config.security.jwt_secret, config.security.session_ttl_secs)
    }

    /// Token lifetime in seconds, equal to the session lifetime
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    /// Generate access token for a session
    pub fn generate_access_token(
        &self,
        user_id: Uuid,
        username: &str,
        role: RoleName,
        session_id: Uuid,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.ttl_secs as i64);

        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            sid: session_id.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Validate and decode access token
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AppError> {
        Ok(decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::LoginRequired
            })?
            .claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(&Secret::new("test_secret_key_32_characters_long!".to_string()), 900).unwrap()
    }

    #[test]
    fn test_generate_and_validate_access_token() {
        let service = service();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let token = service
            .generate_access_token(user_id, "testuser", RoleName::Admin, session_id)
            .unwrap();

        let claims = service.validate_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.session_id().unwrap(), session_id);
        assert_eq!(claims.username, "testuser");
        assert_eq!(claims.role, RoleName::Admin);
        assert_eq!(claims.exp - claims.iat, 900);
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(JwtService::new(&Secret::new("short".to_string()), 900).is_err());
    }

    #[test]
    fn test_invalid_token_fails() {
        assert!(matches!(
            service().validate_access_token("invalid_token"),
            Err(AppError::LoginRequired)
        ));
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let other =
            JwtService::new(&Secret::new("another_secret_key_32_characters_xx".to_string()), 900)
                .unwrap();
        let token = other
            .generate_access_token(Uuid::new_v4(), "x", RoleName::Viewer, Uuid::new_v4())
            .unwrap();
        assert!(service().validate_access_token(&token).is_err());
    }
}
