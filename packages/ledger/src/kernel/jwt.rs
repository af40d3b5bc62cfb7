use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::BaseAuthVerifier;
use crate::common::MemberId;

/// JWT Claims - data stored in the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,         // Subject (member_id as string)
    pub member_id: MemberId, // Member id the ledger acts for
    pub exp: i64,            // Expiration timestamp
    pub iat: i64,            // Issued at timestamp
    pub iss: String,         // Issuer
    pub jti: String,         // JWT ID (unique token identifier)
}

/// Verifies HS256 bearer tokens issued by the auth service
#[derive(Clone)]
pub struct JwtAuthVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtAuthVerifier {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Issue a token for a member. Used by tests and tooling; production
    /// tokens come from the auth service.
    pub fn create_token(&self, member_id: MemberId, ttl: Duration) -> Result<String> {
        let now = chrono::Utc::now();
        let exp = now + ttl;

        let claims = Claims {
            sub: member_id.to_string(),
            member_id,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a JWT token
    ///
    /// Returns claims if token is valid and not expired
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}

#[async_trait]
impl BaseAuthVerifier for JwtAuthVerifier {
    async fn verify(&self, bearer: &str) -> Result<MemberId> {
        let token = bearer.strip_prefix("Bearer ").unwrap_or(bearer).trim();
        if token.is_empty() {
            return Err(anyhow!("Missing bearer token"));
        }
        let claims = self.verify_token(token)?;
        if claims.sub != claims.member_id.to_string() {
            return Err(anyhow!("Token subject does not match member id"));
        }
        Ok(claims.member_id)
    }
}
