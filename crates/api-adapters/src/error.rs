//! # ApiError
//!
//! Failures that escape a handler. Recoverable domain errors are normally
//! turned into a flash + redirect inside the handler; whatever reaches this
//! type is rendered as the error page.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use domains::DomainError;
use thiserror::Error;
use tracing::error;

use crate::views::{ErrorPage, Layout};

pub const NOT_FOUND_MESSAGE: &str = "Page not found!";
pub const INTERNAL_MESSAGE: &str = "Something went wrong!";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Page not found!")]
    NotFound,

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Domain(err) => match err {
                DomainError::NotFound { .. } | DomainError::NoMatches => StatusCode::NOT_FOUND,
                DomainError::Validation(_) => StatusCode::BAD_REQUEST,
                DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
                DomainError::Conflict(_) => StatusCode::CONFLICT,
                DomainError::MissingOwner(_)
                | DomainError::Media(_)
                | DomainError::Storage(_)
                | DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// What the visitor gets to read. Internal details stay in the log.
    fn public_message(&self, status: StatusCode) -> String {
        match self {
            ApiError::NotFound => NOT_FOUND_MESSAGE.to_string(),
            _ if status.is_server_error() => INTERNAL_MESSAGE.to_string(),
            ApiError::Domain(err) => err.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "request failed");
        }

        let page = ErrorPage {
            layout: Layout::default(),
            status: status.as_u16(),
            message: self.public_message(status),
        };
        match page.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(err) => {
                error!(error = %err, "error page failed to render");
                (status, page.message).into_response()
            }
        }
    }
}
