//! Request middleware that runs outside the router.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::middleware::Next;
use axum::response::Response;
use url::form_urlencoded;

use crate::metrics::Metrics;

/// Reads a tunnelled method from `?_method=` on a POST.
pub fn override_method(query: &str) -> Option<Method> {
    let (_, value) = form_urlencoded::parse(query.as_bytes()).find(|(key, _)| key == "_method")?;
    match value.to_ascii_uppercase().as_str() {
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}

/// HTML forms can only POST; `POST /x?_method=DELETE` is routed as
/// `DELETE /x`. Must wrap the router, not sit inside it.
pub async fn method_override(mut req: Request, next: Next) -> Response {
    if req.method() == Method::POST {
        if let Some(method) = req.uri().query().and_then(override_method) {
            *req.method_mut() = method;
        }
    }
    next.run(req).await
}

/// Counts every response by method and status.
pub async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let response = next.run(req).await;
    metrics.record_request(method.as_str(), response.status().as_u16());
    response
}
