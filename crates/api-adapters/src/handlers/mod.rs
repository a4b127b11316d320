//! # Handlers
//!
//! Route handlers grouped by resource. They translate between HTTP and the
//! services: recoverable [`DomainError`]s become a flash message plus a
//! redirect, everything else bubbles up as an [`ApiError`].

pub mod listings;
pub mod metrics;
pub mod oauth;
pub mod reviews;
pub mod users;

use askama::Template;
use axum::response::{Html, IntoResponse, Redirect, Response};
use domains::DomainError;

use crate::error::ApiError;

pub const LISTING_NOT_FOUND: &str = "Listing you requested for does not exist!";
pub const OWNER_MISSING: &str = "Listing owner information is missing!";
pub const NO_LISTINGS: &str = "Listings is not here !!!";
pub const REVIEW_NOT_FOUND: &str = "Review you requested for does not exist!";

pub(crate) fn render<T: Template>(page: T) -> Result<Response, ApiError> {
    Ok(Html(page.render()?).into_response())
}

pub(crate) fn redirect(to: &str) -> Response {
    Redirect::to(to).into_response()
}

/// The sentence shown to the visitor for a recoverable failure.
pub(crate) fn flash_text(err: &DomainError) -> String {
    match err {
        DomainError::NotFound { entity: "review", .. } => REVIEW_NOT_FOUND.to_string(),
        DomainError::NotFound { .. } => LISTING_NOT_FOUND.to_string(),
        DomainError::MissingOwner(_) => OWNER_MISSING.to_string(),
        DomainError::NoMatches => NO_LISTINGS.to_string(),
        DomainError::Validation(msg)
        | DomainError::Unauthorized(msg)
        | DomainError::Forbidden(msg)
        | DomainError::Conflict(msg) => msg.clone(),
        other => other.to_string(),
    }
}

pub async fn root() -> Redirect {
    Redirect::to("/listings")
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
