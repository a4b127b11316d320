//! Reviews nested under a listing.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Form;
use domains::DomainError;
use services::listings::parse_listing_id;

use super::{flash_text, redirect};
use crate::error::ApiError;
use crate::forms::ReviewForm;
use crate::session::{AuthUser, Session};
use crate::state::AppState;

fn back_to(raw_listing_id: &str, err: Option<&DomainError>) -> String {
    let listing_gone = matches!(err, Some(DomainError::NotFound { entity: "listing", .. }));
    if listing_gone || parse_listing_id(raw_listing_id).is_err() {
        return "/listings".to_string();
    }
    format!("/listings/{}", raw_listing_id.trim())
}

/// `POST /listings/{id}/reviews`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Path(id): Path<String>,
    Form(form): Form<ReviewForm>,
) -> Result<Response, ApiError> {
    let result = match form.into_review() {
        Ok(input) => state.reviews.create(user.id, &id, input).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(_) => {
            state.metrics.reviews_created.inc();
            session.success("New Review Created!");
            Ok(redirect(&back_to(&id, None)))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect(&back_to(&id, Some(&err))))
        }
        Err(err) => Err(err.into()),
    }
}

/// `DELETE /listings/{id}/reviews/{review_id}`
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Path((id, review_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    match state.reviews.delete(user.id, &id, &review_id).await {
        Ok(()) => {
            session.success("Review Deleted!");
            Ok(redirect(&back_to(&id, None)))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect(&back_to(&id, Some(&err))))
        }
        Err(err) => Err(err.into()),
    }
}
