use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::models::{claims::Claims, entity::Entity};

/// Why a token could not be issued or accepted.
#[derive(Error, Debug)]
pub enum TokenError {
    /// The service was built without a signing secret.
    #[error("signing secret is not configured")]
    MissingSecret,

    /// Bad signature, malformed structure, or expired.
    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256 session tokens.
///
/// Verification is purely cryptographic: it never consults the entity
/// directory, so a token for a deleted account stays valid until it
/// expires (or forever when no lifetime is configured).
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Option<Duration>,
}

impl TokenService {
    /// Creates a new `TokenService`. Fails when `secret` is empty.
    pub fn new(secret: &[u8], ttl_hours: Option<i64>) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // `exp` is optional; when present it is still checked.
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: ttl_hours.map(Duration::hours),
        })
    }

    /// Signs a token carrying the entity's id, role and email.
    pub fn issue(&self, entity: &Entity) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: entity.id,
            role: entity.role,
            email: entity.email.clone(),
            iat: now.timestamp(),
            exp: self.ttl.map(|ttl| (now + ttl).timestamp()),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        tracing::debug!("🔑 Token issued for entity: {}", entity.id);
        Ok(token)
    }

    /// Checks the signature and structure and returns the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims)
    }
}
