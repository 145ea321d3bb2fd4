//! `strata-auth` — authentication, lockout, and credential primitives.
//!
//! This crate is intentionally decoupled from HTTP and storage backends: the
//! principal directory, audit sink, and token signer are all seams.

pub mod authn;
pub mod claims;
pub mod error;
pub mod lockout;
pub mod password;
pub mod principal;
pub mod token;

pub use authn::{AuthenticationService, LoginRequest, LoginSuccess};
pub use claims::{JwtClaims, TokenKind, TokenValidationError, validate_claims};
pub use error::AuthError;
pub use lockout::{AccountLockoutService, LockoutConfig};
pub use password::{CredentialHasher, CryptoError, PasswordDigest, PasswordScheme};
pub use principal::{InMemoryPrincipalDirectory, PrincipalDirectory, UserRecord, UserStatus};
pub use token::{Hs256TokenSigner, TokenConfig, TokenError, TokenSigner};
