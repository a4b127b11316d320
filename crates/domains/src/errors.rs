//! # DomainError
//!
//! Centralized error handling for the Wanderlust ecosystem.
//! Maps domain-specific failures to actionable error types; the web layer
//! decides which of them become a flash message and which become an error page.

use thiserror::Error;
use uuid::Uuid;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Resource not found (e.g. Listing, Review, User)
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: String },

    /// The listing exists but its owner reference no longer resolves.
    #[error("owner of listing {0} no longer exists")]
    MissingOwner(Uuid),

    /// A search or filter ran to completion without a single hit.
    #[error("no listings matched")]
    NoMatches,

    /// Validation failure (bad id format, empty search, missing field)
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or missing session
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but the ownership policy refused the action
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Resource already exists (e.g. duplicate username)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Image storage failure (upload rejected, storage unreachable)
    #[error("media error: {0}")]
    Media(String),

    /// Persistence failure (e.g. DB down, broken row)
    #[error("storage error: {0}")]
    Storage(String),

    /// Anything else that should surface as a 500
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// True for failures the user can recover from by changing their input.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Media(_) | Self::Storage(_) | Self::Internal(_)
        )
    }
}

/// A specialized Result type for Wanderlust logic.
pub type DomainResult<T> = std::result::Result<T, DomainError>;
