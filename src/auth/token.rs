use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies the HS256 bearer tokens handed out at login.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }

    #[instrument(skip(self))]
    pub fn issue(&self, user_id: i64) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    #[instrument(skip_all)]
    pub fn verify(&self, token: &str) -> Result<i64, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;

        data.claims
            .sub
            .parse()
            .map_err(|_| AppError::Authentication("Invalid token subject".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_resolves_to_user() {
        let service = TokenService::new("secret", Duration::hours(24));
        let token = service.issue(42).unwrap();
        assert_eq!(service.verify(&token).unwrap(), 42);
    }

    #[test]
    fn expired_token_is_rejected() {
        let service = TokenService::new("secret", Duration::hours(-2));
        let token = service.issue(7).unwrap();
        assert!(matches!(
            service.verify(&token),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let issuer = TokenService::new("one", Duration::hours(1));
        let verifier = TokenService::new("two", Duration::hours(1));
        let token = issuer.issue(1).unwrap();
        assert!(verifier.verify(&token).is_err());
        assert!(verifier.verify("not-a-jwt").is_err());
    }
}
