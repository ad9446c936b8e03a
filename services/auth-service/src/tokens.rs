use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use common_auth::{JwtConfig, TokenClaims};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

/// Signs HS256 access tokens with the shared secret the verifier checks against.
pub struct TokenSigner {
    encoding_key: EncodingKey,
    ttl: Duration,
}

pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in: i64,
    pub token_type: &'static str,
}

impl TokenSigner {
    pub fn new(config: &JwtConfig) -> Result<Self> {
        let ttl = Duration::from_std(config.access_ttl).context("Token lifetime out of range")?;
        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret()),
            ttl,
        })
    }

    pub fn issue(&self, user_id: Uuid, roles: &[String]) -> Result<IssuedToken> {
        self.issue_at(user_id, roles, Utc::now())
    }

    pub fn issue_at(&self, user_id: Uuid, roles: &[String], now: DateTime<Utc>) -> Result<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = TokenClaims {
            sub: user_id.to_string(),
            roles: roles.to_vec(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| anyhow!("Failed to sign access token: {err}"))?;

        Ok(IssuedToken {
            token,
            expires_at,
            expires_in: self.ttl.num_seconds(),
            token_type: "Bearer",
        })
    }
}
