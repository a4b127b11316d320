use std::sync::Arc;

use auth_adapters::OAuthProviders;
use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use domains::{OAuthProvider, SessionStore, UserSummary};
use services::{AccountService, ListingService, ReviewService};

use crate::metrics::Metrics;
use crate::session::Session;
use crate::views::Layout;

/// Shared across every request. Cheap to clone: services hold `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub listings: ListingService,
    pub reviews: ReviewService,
    pub accounts: AccountService,
    pub sessions: Arc<dyn SessionStore>,
    /// Signs the session cookie.
    pub cookie_key: Key,
    pub oauth: OAuthProviders,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Page chrome for a response that is about to be rendered. Pending
    /// flash messages are consumed here, so only call it on the render path.
    pub fn layout(&self, current_user: Option<UserSummary>, session: &Session) -> Layout {
        Layout::new(current_user, session.take_flash()).with_providers(
            self.oauth.is_enabled(OAuthProvider::GitHub),
            self.oauth.is_enabled(OAuthProvider::Google),
        )
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
