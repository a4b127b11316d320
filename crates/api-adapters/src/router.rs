//! Route table and middleware stack.

use std::path::PathBuf;

use axum::extract::{DefaultBodyLimit, Request};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::handlers::{self, listings, oauth, reviews, users};
use crate::middleware::{method_override, track_requests};
use crate::session::session_layer;
use crate::state::AppState;

pub struct RouterConfig {
    pub public_dir: PathBuf,
    /// Served under `/media` when uploads are kept on local disk.
    pub upload_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

pub fn build_router(state: AppState, config: RouterConfig) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::root))
        .route("/listings", get(listings::index).post(listings::create))
        .route("/listings/new", get(listings::new_form))
        .route("/listings/search", get(listings::search))
        .route("/listings/category/{name}", get(listings::category))
        .route(
            "/listings/{id}",
            get(listings::show)
                .put(listings::update)
                .delete(listings::delete),
        )
        .route("/listings/{id}/edit", get(listings::edit_form))
        .route("/listings/{id}/reviews", post(reviews::create))
        .route(
            "/listings/{id}/reviews/{review_id}",
            delete(reviews::delete),
        )
        .route("/signup", get(users::signup_form).post(users::signup))
        .route("/login", get(users::login_form).post(users::login))
        .route("/logout", get(users::logout))
        .route("/auth/{provider}", get(oauth::start))
        .route("/auth/{provider}/callback", get(oauth::callback))
        .route("/metrics", get(handlers::metrics::export))
        .nest_service("/public", ServeDir::new(&config.public_dir));

    if let Some(dir) = &config.upload_dir {
        app = app.nest_service("/media", ServeDir::new(dir));
    }

    let app = app
        .fallback(handlers::not_found)
        .layer(from_fn_with_state(state.clone(), session_layer))
        .with_state(state.clone());

    // The method override has to run before routing, so it wraps the
    // finished router instead of being one of its layers.
    Router::new()
        .fallback_service(app)
        .layer(from_fn(method_override))
        .layer(from_fn_with_state(state.metrics.clone(), track_requests))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        request_id = %request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
