use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity carried by a verified token. Lives for the duration of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Claims {
    pub subject: Uuid,
    pub roles: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Wire form of [`Claims`] as encoded in the JWT payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
}

impl From<&Claims> for TokenClaims {
    fn from(value: &Claims) -> Self {
        Self {
            sub: value.subject.to_string(),
            roles: value.roles.clone(),
            iat: value.issued_at.timestamp(),
            exp: value.expires_at.timestamp(),
        }
    }
}

/// Name of the claim that failed to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidClaim(pub &'static str);

impl TryFrom<TokenClaims> for Claims {
    type Error = InvalidClaim;

    fn try_from(value: TokenClaims) -> Result<Self, Self::Error> {
        let subject = Uuid::parse_str(&value.sub).map_err(|_| InvalidClaim("sub"))?;
        let issued_at = Utc
            .timestamp_opt(value.iat, 0)
            .single()
            .ok_or(InvalidClaim("iat"))?;
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or(InvalidClaim("exp"))?;

        Ok(Self {
            subject,
            roles: value.roles,
            issued_at,
            expires_at,
        })
    }
}
