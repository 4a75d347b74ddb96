//! Session token verification
//!
//! The identity provider signs access tokens with a shared HS256 secret.
//! We verify signature and expiry locally; no introspection round trip.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Claims carried by the identity provider's access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id
    pub sub: String,
    pub email: Option<String>,
    pub exp: usize,
}

/// Verifier for identity-provider session tokens
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The provider sets aud to its own role name; we key trust on the
        // shared secret and expiry instead.
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a bearer token and return the authenticated subject
    pub fn verify(&self, token: &str) -> Result<(Uuid, Option<String>), ApiError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Token verification failed");
                ApiError::InvalidToken
            })?;

        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| ApiError::InvalidToken)?;

        Ok((user_id, data.claims.email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-jwt-secret-must-be-at-least-32-characters-long";

    fn make_token(sub: &str, exp_offset: i64, secret: &str) -> String {
        let exp = (time::OffsetDateTime::now_utc().unix_timestamp() + exp_offset) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            email: Some("user@example.test".to_string()),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_verifies() {
        let user_id = Uuid::new_v4();
        let verifier = JwtVerifier::new(SECRET);
        let token = make_token(&user_id.to_string(), 3600, SECRET);

        let (verified_id, email) = verifier.verify(&token).unwrap();
        assert_eq!(verified_id, user_id);
        assert_eq!(email.as_deref(), Some("user@example.test"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let token = make_token(&Uuid::new_v4().to_string(), -3600, SECRET);
        assert!(matches!(
            verifier.verify(&token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let token = make_token(
            &Uuid::new_v4().to_string(),
            3600,
            "another-secret-that-is-also-32-characters-plus",
        );
        assert!(matches!(
            verifier.verify(&token),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let verifier = JwtVerifier::new(SECRET);
        let token = make_token("not-a-uuid", 3600, SECRET);
        assert!(matches!(
            verifier.verify(&token),
            Err(ApiError::InvalidToken)
        ));
    }
}
