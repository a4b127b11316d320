//! Keying for the signed session cookie.
//!
//! Only the session id travels in the cookie, signed by a
//! `SignedCookieJar`; the session body lives in a `SessionStore`.

use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use uuid::Uuid;

/// Expands the configured secret into the 64 bytes a cookie [`Key`] needs.
/// The same secret always yields the same key, so cookies survive restarts.
pub fn session_key(secret: &[u8]) -> Key {
    Key::from(Sha512::digest(secret).as_slice())
}

/// A fresh, unguessable session id.
pub fn new_session_id() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
