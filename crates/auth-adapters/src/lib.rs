//! auth-adapters
//!
//! Credential hashing, signed session cookies and external identity
//! providers.

pub mod password;

#[cfg(feature = "auth-cookie")]
pub mod cookie;

#[cfg(feature = "auth-oauth")]
pub mod oauth;

pub use password::Argon2Hasher;

#[cfg(feature = "auth-cookie")]
pub use cookie::{new_session_id, session_key};

#[cfg(feature = "auth-oauth")]
pub use oauth::{GitHubProvider, GoogleProvider, OAuthClientConfig, OAuthProviders};
