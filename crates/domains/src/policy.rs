//! Who may change what.
//!
//! Edits and deletes historically went through without comparing the
//! requester to the owner/author. `Permissive` keeps that behavior;
//! `Enforced` closes the gap. The choice is made once, in configuration.

use std::str::FromStr;

use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{DomainError, DomainResult};
use crate::models::{Listing, Review};

pub const NOT_LISTING_OWNER: &str = "You are not the owner of this listing";
pub const NOT_REVIEW_AUTHOR: &str = "You are not the author of this review";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnershipPolicy {
    /// Any authenticated user may edit or delete.
    #[default]
    Permissive,
    /// Only the listing owner / review author may edit or delete.
    Enforced,
}

impl OwnershipPolicy {
    pub fn authorize_listing(&self, actor: Uuid, listing: &Listing) -> DomainResult<()> {
        match self {
            OwnershipPolicy::Permissive => Ok(()),
            OwnershipPolicy::Enforced if listing.owner_id == Some(actor) => Ok(()),
            OwnershipPolicy::Enforced => Err(DomainError::Forbidden(NOT_LISTING_OWNER.into())),
        }
    }

    pub fn authorize_review(&self, actor: Uuid, review: &Review) -> DomainResult<()> {
        match self {
            OwnershipPolicy::Permissive => Ok(()),
            OwnershipPolicy::Enforced if review.author_id == Some(actor) => Ok(()),
            OwnershipPolicy::Enforced => Err(DomainError::Forbidden(NOT_REVIEW_AUTHOR.into())),
        }
    }
}

impl FromStr for OwnershipPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(OwnershipPolicy::Permissive),
            "enforced" => Ok(OwnershipPolicy::Enforced),
            other => Err(DomainError::validation(format!(
                "unknown ownership policy '{other}' (expected 'permissive' or 'enforced')"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn review_by(author: Option<Uuid>) -> Review {
        Review {
            id: Uuid::now_v7(),
            comment: "Great stay".into(),
            rating: 4,
            author_id: author,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn permissive_allows_anyone() {
        let review = review_by(Some(Uuid::now_v7()));
        assert!(OwnershipPolicy::Permissive
            .authorize_review(Uuid::now_v7(), &review)
            .is_ok());
    }

    #[test]
    fn enforced_requires_author() {
        let author = Uuid::now_v7();
        let review = review_by(Some(author));
        let policy = OwnershipPolicy::Enforced;
        assert!(policy.authorize_review(author, &review).is_ok());
        assert_eq!(
            policy.authorize_review(Uuid::now_v7(), &review),
            Err(DomainError::Forbidden(NOT_REVIEW_AUTHOR.into()))
        );
        // an orphaned review belongs to nobody
        assert!(policy.authorize_review(author, &review_by(None)).is_err());
    }

    #[test]
    fn parses_from_config_strings() {
        assert_eq!("Enforced".parse::<OwnershipPolicy>(), Ok(OwnershipPolicy::Enforced));
        assert_eq!(" permissive ".parse::<OwnershipPolicy>(), Ok(OwnershipPolicy::Permissive));
        assert!("strict".parse::<OwnershipPolicy>().is_err());
    }
}
