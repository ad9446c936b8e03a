use std::fmt;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// Cookie carrying the session token when no bearer header is sent.
pub const DEFAULT_COOKIE_NAME: &str = "jid";

const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(60 * 60);

/// Runtime configuration shared by token issuance and verification.
#[derive(Clone)]
pub struct JwtConfig {
    secret: Vec<u8>,
    /// Lifetime of an issued access token.
    pub access_ttl: Duration,
    /// Allowable clock skew in seconds when checking `exp`.
    pub leeway_seconds: u64,
    /// Name of the cookie consulted when the Authorization header is absent.
    pub cookie_name: String,
}

impl JwtConfig {
    /// Construct config with a one hour lifetime and no leeway.
    pub fn new(secret: impl Into<Vec<u8>>) -> AuthResult<Self> {
        let secret = secret.into();
        if secret.iter().all(u8::is_ascii_whitespace) {
            return Err(AuthError::Config("JWT secret must not be empty"));
        }
        Ok(Self {
            secret,
            access_ttl: DEFAULT_ACCESS_TTL,
            leeway_seconds: 0,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    /// Adjust the allowed leeway.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds;
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("leeway_seconds", &self.leeway_seconds)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}
