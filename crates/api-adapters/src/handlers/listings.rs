//! `/listings` and everything under it except reviews.

use axum::extract::{Multipart, Path, Query, State};
use axum::response::Response;
use domains::DomainError;
use tracing::error;

use super::{flash_text, redirect, render, NO_LISTINGS};
use crate::error::ApiError;
use crate::forms::{ListingForm, SearchParams};
use crate::session::{AuthUser, CurrentUser, Session};
use crate::state::AppState;
use crate::views::{EditPage, IndexPage, NewPage, ShowPage};

pub const LOAD_FAILED: &str = "An error occurred while loading the listing. Please try again.";

/// `GET /listings`
pub async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, ApiError> {
    let listings = state.listings.index().await?;
    render(IndexPage::new(state.layout(user, &session), &listings, None))
}

/// `GET /listings/new`
pub async fn new_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
) -> Result<Response, ApiError> {
    render(NewPage::new(state.layout(Some(user), &session)))
}

/// `POST /listings`
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = ListingForm::from_multipart(multipart).await?;
    let result = match form.into_parts() {
        Ok((input, image)) => state.listings.create(user.id, input, image).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(_) => {
            state.metrics.listings_created.inc();
            session.success("New Listing Created!");
            Ok(redirect("/listings"))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect("/listings/new"))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /listings/{id}`
///
/// Every failure lands back on the index with a message; a broken store is
/// logged but not shown.
pub async fn show(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.listings.show(&id).await {
        Ok(detail) => render(ShowPage::new(state.layout(user, &session), &detail)),
        Err(err) => {
            let text = match &err {
                DomainError::Validation(_)
                | DomainError::NotFound { .. }
                | DomainError::MissingOwner(_) => flash_text(&err),
                other => {
                    error!(listing_id = %id, error = %other, "failed to load listing");
                    LOAD_FAILED.to_string()
                }
            };
            session.error(text);
            Ok(redirect("/listings"))
        }
    }
}

/// `GET /listings/{id}/edit`
pub async fn edit_form(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.listings.edit_form(user.id, &id).await {
        Ok((listing, preview)) => render(EditPage::new(
            state.layout(Some(user), &session),
            &listing,
            preview,
        )),
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect(&after_refusal(&err, &id)))
        }
        Err(err) => Err(err.into()),
    }
}

/// `PUT /listings/{id}`
pub async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = ListingForm::from_multipart(multipart).await?;
    let result = match form.into_parts() {
        Ok((changes, image)) => state.listings.update(user.id, &id, changes, image).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(listing) => {
            session.success("Listing Updated !!");
            Ok(redirect(&format!("/listings/{}", listing.id)))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            let to = match &err {
                DomainError::Validation(_) if services::listings::parse_listing_id(&id).is_ok() => {
                    format!("/listings/{}/edit", id.trim())
                }
                _ => after_refusal(&err, &id),
            };
            Ok(redirect(&to))
        }
        Err(err) => Err(err.into()),
    }
}

/// `DELETE /listings/{id}`
pub async fn delete(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.listings.delete(user.id, &id).await {
        Ok(_) => {
            state.metrics.listings_deleted.inc();
            session.success("Listing Deleted!");
            Ok(redirect("/listings"))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect(&after_refusal(&err, &id)))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /listings/category/{name}`
pub async fn category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    match state.listings.by_category(&name).await {
        Ok(listings) => {
            let notice = format!("Listings Find by {name}");
            let page = IndexPage::new(state.layout(user, &session), &listings, Some(notice));
            render(page.for_category(&name))
        }
        Err(DomainError::NoMatches) => {
            session.error(NO_LISTINGS);
            Ok(redirect("/listings"))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /listings/search?q=`
pub async fn search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let raw = params.q.unwrap_or_default();
    match state.listings.search(&raw).await {
        Ok(outcome) => {
            state.metrics.record_search(outcome.strategy.label());
            let notice = outcome.strategy.notice();
            render(IndexPage::new(
                state.layout(user, &session),
                &outcome.listings,
                Some(notice),
            ))
        }
        Err(err @ (DomainError::Validation(_) | DomainError::NoMatches)) => {
            if err == DomainError::NoMatches {
                state.metrics.search_misses.inc();
            }
            session.error(flash_text(&err));
            Ok(redirect("/listings"))
        }
        Err(err) => Err(err.into()),
    }
}

/// Where to go after a refused listing action: back to the listing when the
/// refusal was about permissions, otherwise to the index.
fn after_refusal(err: &DomainError, raw_id: &str) -> String {
    match err {
        DomainError::Forbidden(_) if services::listings::parse_listing_id(raw_id).is_ok() => {
            format!("/listings/{}", raw_id.trim())
        }
        _ => "/listings".to_string(),
    }
}
