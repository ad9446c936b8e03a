pub mod claims;
pub mod config;
pub mod error;
pub mod extractors;
pub mod roles;
pub mod verifier;

pub use claims::{Claims, TokenClaims};
pub use config::{JwtConfig, DEFAULT_COOKIE_NAME};
pub use error::{AuthError, AuthResult};
pub use extractors::{cookie_value, credential_from_headers, AuthContext};
pub use roles::{is_known_role, KNOWN_ROLES, ROLE_ADMIN, ROLE_AUDITOR, ROLE_GUEST, ROLE_USER};
pub use verifier::JwtVerifier;
