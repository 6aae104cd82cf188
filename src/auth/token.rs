use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::Claims;

pub const TOKEN_TYPE: &str = "Bearer";

/// Signs and verifies HS256 bearer credentials with a shared secret.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_secs: i64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Config("jwt secret cannot be empty".to_string()));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        })
    }

    /// Issues a credential for the given tenant scope.
    pub fn issue(&self, org: &str, company_id: i64, admin: bool) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            org: org.to_string(),
            company_id,
            admin,
            iat: now,
            exp: now + self.ttl_secs,
            jti: Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Config(format!("failed to sign token: {e}")))
    }

    /// Verifies signature and expiry, returning the carried claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);

        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected bearer credential: {e}");
                Error::Unauthenticated
            })
    }

    /// Reads the `org` claim without checking the signature or expiry.
    /// Only the abuse guard uses this, so forged credentials for a flagged
    /// org are throttled exactly like genuine ones.
    #[must_use]
    pub fn peek_org(&self, token: &str) -> Option<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        jsonwebtoken::decode::<serde_json::Value>(token, &self.decoding, &validation)
            .ok()
            .and_then(|data| data.claims.get("org")?.as_str().map(str::to_string))
    }
}
