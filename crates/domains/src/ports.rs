//! # Ports
//!
//! Any adapter must implement these traits to be wired into the binary.
//! Services only ever see `Arc<dyn Port>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::DomainResult;
use crate::models::{
    ImageRef, Listing, ListingQuery, OAuthProfile, OAuthProvider, OwnedListing, Review, Upload,
    User, UserSummary,
};
use crate::session::SessionData;

/// Persistence contract for listings.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn insert(&self, listing: &Listing) -> DomainResult<()>;
    /// Raw lookup; the owner is not resolved.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Listing>>;
    /// Replaces the stored document. Returns `false` if it no longer exists.
    async fn update(&self, listing: &Listing) -> DomainResult<bool>;
    /// Deletes by id and hands back the removed document.
    async fn delete(&self, id: Uuid) -> DomainResult<Option<Listing>>;

    /// Runs a query restricted to listings whose owner resolves.
    async fn find_owned(&self, query: &ListingQuery) -> DomainResult<Vec<OwnedListing>>;

    // Maintenance
    async fn list_all(&self) -> DomainResult<Vec<Listing>>;
    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<u64>;

    // Review references
    async fn push_review(&self, listing_id: Uuid, review_id: Uuid) -> DomainResult<bool>;
    async fn pull_review(&self, listing_id: Uuid, review_id: Uuid) -> DomainResult<bool>;
}

/// Persistence contract for accounts.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` on a duplicate username or external id.
    async fn insert(&self, user: &User) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> DomainResult<Option<User>>;
    async fn find_by_external_id(
        &self,
        provider: OAuthProvider,
        external_id: &str,
    ) -> DomainResult<Option<User>>;
    /// Resolves a batch of references; ids with no user are simply absent.
    async fn summaries(&self, ids: &[Uuid]) -> DomainResult<Vec<UserSummary>>;
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;
}

/// Persistence contract for reviews.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn insert(&self, review: &Review) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Review>>;
    /// Unordered; missing ids are skipped.
    async fn get_many(&self, ids: &[Uuid]) -> DomainResult<Vec<Review>>;
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;
    async fn delete_many(&self, ids: &[Uuid]) -> DomainResult<u64>;
}

/// Media storage contract for listing images.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Persists the upload and returns the (url, storage id) pair.
    async fn store(&self, upload: Upload) -> DomainResult<ImageRef>;
    async fn delete(&self, image: &ImageRef) -> DomainResult<()>;
}

/// One-way credential hashing.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> DomainResult<String>;
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Server-side session persistence.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `None` for unknown or expired sessions.
    async fn load(&self, id: &str) -> DomainResult<Option<SessionData>>;
    async fn save(&self, id: &str, data: &SessionData, expires_at: DateTime<Utc>) -> DomainResult<()>;
    async fn destroy(&self, id: &str) -> DomainResult<()>;
    /// Deletes every expired session. Returns how many were removed.
    async fn purge_expired(&self) -> DomainResult<u64>;
}

/// An external identity provider (authorization-code flow).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    fn provider(&self) -> OAuthProvider;
    /// Where to send the browser to start signing in.
    fn authorize_url(&self, state: &str) -> String;
    /// Trades the callback `code` for the signed-in user's profile.
    async fn exchange(&self, code: &str) -> DomainResult<OAuthProfile>;
}
