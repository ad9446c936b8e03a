use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use tracing::debug;

use crate::claims::{Claims, InvalidClaim, TokenClaims};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// Validates HS256 tokens against the configured shared secret.
///
/// Holds no mutable state; a single instance is shared across requests behind an `Arc`.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    key: DecodingKey,
    validation: Validation,
}

/// Internal reason a token was rejected. Only ever logged.
#[derive(Debug)]
enum Rejection {
    Malformed(String),
    Signature,
    Claim(&'static str),
    Expired,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Malformed(detail) => write!(f, "malformed token ({detail})"),
            Rejection::Signature => f.write_str("signature mismatch"),
            Rejection::Claim(name) => write!(f, "invalid claim '{name}'"),
            Rejection::Expired => f.write_str("token expired"),
        }
    }
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        let key = DecodingKey::from_secret(config.secret());

        // Expiry is checked against an explicit clock in `verify_at`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        Self {
            config,
            key,
            validation,
        }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify `token` as of `now`. Every failure collapses to [`AuthError::AuthenticationFailed`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Claims> {
        match self.decode(token, now) {
            Ok(claims) => Ok(claims),
            Err(reason) => {
                debug!(%reason, "token rejected");
                Err(AuthError::AuthenticationFailed)
            }
        }
    }

    fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Rejection> {
        let data = decode::<TokenClaims>(token, &self.key, &self.validation).map_err(|err| {
            match err.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => Rejection::Signature,
                _ => Rejection::Malformed(err.to_string()),
            }
        })?;

        let claims =
            Claims::try_from(data.claims).map_err(|InvalidClaim(name)| Rejection::Claim(name))?;

        let leeway = i64::try_from(self.config.leeway_seconds).unwrap_or(i64::MAX);
        let deadline = Duration::try_seconds(leeway)
            .and_then(|leeway| claims.expires_at.checked_add_signed(leeway))
            .unwrap_or(claims.expires_at);
        if now > deadline {
            return Err(Rejection::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    const SECRET: &str = "verifier-test-secret";

    fn verifier(secret: &str) -> JwtVerifier {
        JwtVerifier::new(JwtConfig::new(secret).expect("config"))
    }

    fn issue_token(
        secret: &str,
        algorithm: Algorithm,
        issued_at: DateTime<Utc>,
        ttl_seconds: i64,
    ) -> (String, Uuid, Vec<String>) {
        let subject = Uuid::new_v4();
        let roles = vec!["admin".to_string(), "auditor".to_string()];
        let claims = TokenClaims {
            sub: subject.to_string(),
            roles: roles.clone(),
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp() + ttl_seconds,
        };
        let token = encode(
            &Header::new(algorithm),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("sign token");
        (token, subject, roles)
    }

    #[test]
    fn verifier_accepts_valid_token() {
        let (token, subject, roles) = issue_token(SECRET, Algorithm::HS256, Utc::now(), 600);
        let claims = verifier(SECRET).verify(&token).expect("verification succeeds");

        assert_eq!(claims.subject, subject);
        assert_eq!(claims.roles, roles);
        assert!(claims.expires_at > claims.issued_at);
    }

    #[test]
    fn verifier_rejects_foreign_secret() {
        let (token, _, _) = issue_token("some-other-secret", Algorithm::HS256, Utc::now(), 600);
        let err = verifier(SECRET).verify(&token).expect_err("must fail");
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    #[test]
    fn verifier_rejects_expired_token_with_valid_signature() {
        let issued = Utc::now() - Duration::hours(2);
        let (token, _, _) = issue_token(SECRET, Algorithm::HS256, issued, 3600);
        let err = verifier(SECRET).verify(&token).expect_err("must fail");
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    #[test]
    fn expiry_follows_supplied_clock() {
        let issued = Utc::now();
        let (token, _, _) = issue_token(SECRET, Algorithm::HS256, issued, 60);
        let verifier = verifier(SECRET);

        assert!(verifier.verify_at(&token, issued + Duration::seconds(30)).is_ok());
        assert!(verifier.verify_at(&token, issued + Duration::seconds(61)).is_err());
    }

    #[test]
    fn leeway_extends_acceptance_window() {
        let issued = Utc::now();
        let (token, _, _) = issue_token(SECRET, Algorithm::HS256, issued, 60);
        let verifier = JwtVerifier::new(JwtConfig::new(SECRET).expect("config").with_leeway(30));

        assert!(verifier.verify_at(&token, issued + Duration::seconds(80)).is_ok());
        assert!(verifier.verify_at(&token, issued + Duration::seconds(95)).is_err());
    }

    #[test]
    fn verifier_rejects_other_algorithms() {
        let (token, _, _) = issue_token(SECRET, Algorithm::HS512, Utc::now(), 600);
        assert!(matches!(
            verifier(SECRET).verify(&token),
            Err(AuthError::AuthenticationFailed)
        ));
    }

    #[test]
    fn verifier_rejects_garbage() {
        let verifier = verifier(SECRET);
        for token in ["", "abc", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30."] {
            assert!(
                matches!(verifier.verify(token), Err(AuthError::AuthenticationFailed)),
                "expected rejection for {token:?}"
            );
        }
    }

    #[test]
    fn verification_is_idempotent_for_fixed_clock() {
        let issued = Utc::now();
        let (token, _, _) = issue_token(SECRET, Algorithm::HS256, issued, 600);
        let verifier = verifier(SECRET);
        let at = issued + Duration::seconds(5);

        let first = verifier.verify_at(&token, at).expect("first");
        let second = verifier.verify_at(&token, at).expect("second");
        assert_eq!(first, second);
    }
}
