//! api-adapters
//!
//! Server-rendered HTML front end for Wanderlust.
//!
//! Views and metrics are framework-agnostic; everything that touches HTTP
//! lives behind the `web-axum` feature.

pub mod metrics;
pub mod views;

#[cfg(feature = "web-axum")]
pub mod error;
#[cfg(feature = "web-axum")]
pub mod forms;
#[cfg(feature = "web-axum")]
pub mod handlers;
#[cfg(feature = "web-axum")]
pub mod middleware;
#[cfg(feature = "web-axum")]
pub mod router;
#[cfg(feature = "web-axum")]
pub mod session;
#[cfg(feature = "web-axum")]
pub mod state;

pub use metrics::Metrics;

#[cfg(feature = "web-axum")]
pub use error::ApiError;
#[cfg(feature = "web-axum")]
pub use router::{build_router, RouterConfig};
#[cfg(feature = "web-axum")]
pub use state::AppState;
