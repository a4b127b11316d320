//! Sign-in through an external identity provider.

use std::sync::Arc;

use auth_adapters::new_session_id;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use domains::{IdentityProvider, OAuthProvider};
use tracing::{error, warn};

use super::redirect;
use super::users::{landing, WELCOME_BACK};
use crate::error::ApiError;
use crate::forms::OAuthCallback;
use crate::session::Session;
use crate::state::AppState;

/// Resolves the path segment to a configured provider. Unknown names are a
/// 404; known but unconfigured ones flash and bounce to `/login`.
fn configured(
    state: &AppState,
    session: &Session,
    slug: &str,
) -> Result<(OAuthProvider, Arc<dyn IdentityProvider>), Response> {
    let provider: OAuthProvider = slug
        .parse()
        .map_err(|_| ApiError::NotFound.into_response())?;
    match state.oauth.get(provider) {
        Some(client) => Ok((provider, client)),
        None => {
            session.error(format!("{} login is not available", provider.display_name()));
            Err(redirect("/login"))
        }
    }
}

fn failed(session: &Session, provider: OAuthProvider) -> Response {
    session.error(format!("{} login failed", provider.display_name()));
    redirect("/login")
}

/// `GET /auth/{provider}`
pub async fn start(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
) -> Response {
    let (_, client) = match configured(&state, &session, &slug) {
        Ok(found) => found,
        Err(bounce) => return bounce,
    };
    let token = new_session_id();
    session.set_oauth_state(token.as_str());
    redirect(&client.authorize_url(&token))
}

/// `GET /auth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    Path(slug): Path<String>,
    Query(params): Query<OAuthCallback>,
) -> Response {
    let (provider, client) = match configured(&state, &session, &slug) {
        Ok(found) => found,
        Err(bounce) => return bounce,
    };

    let expected = session.take_oauth_state();
    if let Some(reason) = params.error.as_deref() {
        warn!(provider = provider.slug(), %reason, "provider refused sign-in");
        return failed(&session, provider);
    }
    let (Some(code), Some(returned)) = (params.code, params.state) else {
        warn!(provider = provider.slug(), "callback without code or state");
        return failed(&session, provider);
    };
    if expected.as_deref() != Some(returned.as_str()) {
        warn!(provider = provider.slug(), "oauth state mismatch");
        return failed(&session, provider);
    }

    let signed_in = match client.exchange(&code).await {
        Ok(profile) => state.accounts.sign_in_with(profile).await,
        Err(err) => Err(err),
    };
    match signed_in {
        Ok(user) => {
            let target = landing(session.take_return_to());
            session.log_in(user.id);
            state.metrics.record_login(provider.slug());
            session.success(WELCOME_BACK);
            redirect(&target)
        }
        Err(err) => {
            error!(provider = provider.slug(), error = %err, "external sign-in failed");
            failed(&session, provider)
        }
    }
}
