//! # Sessions
//!
//! Server-side sessions keyed by a signed cookie. [`session_layer`] loads the
//! session before routing and persists it after the handler ran, but only if
//! something changed; the id travels in a [`SignedCookieJar`]. Handlers see
//! a [`Session`] handle through the request extensions; [`CurrentUser`] and
//! [`AuthUser`] resolve the logged-in account.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use auth_adapters::new_session_id;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::Method;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::{Duration, Utc};
use domains::{DomainError, FlashKind, FlashMessage, SessionData, UserSummary};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "wanderlust.sid";
pub const SESSION_TTL_DAYS: i64 = 7;
pub const LOGIN_REQUIRED: &str = "you must be logged in to create listing!";

#[derive(Debug, Default)]
struct SessionState {
    id: Option<String>,
    data: SessionData,
    dirty: bool,
    /// Id abandoned by a renewal; destroyed on commit.
    stale: Option<String>,
}

/// Per-request handle on the visitor's session.
#[derive(Clone, Debug, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    fn new(id: Option<String>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                data,
                ..SessionState::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.lock().data.user_id
    }

    /// Binds the session to `user_id` under a fresh id.
    pub fn log_in(&self, user_id: Uuid) {
        let mut state = self.lock();
        if let Some(old) = state.id.take() {
            state.stale = Some(old);
        }
        state.data.user_id = Some(user_id);
        state.data.oauth_state = None;
        state.dirty = true;
    }

    /// Forgets the user but keeps the session, so a goodbye flash survives.
    pub fn log_out(&self) {
        let mut state = self.lock();
        state.data.user_id = None;
        state.data.return_to = None;
        state.dirty = true;
    }

    pub fn flash(&self, kind: FlashKind, text: impl Into<String>) {
        let mut state = self.lock();
        state.data.push_flash(kind, text);
        state.dirty = true;
    }

    pub fn success(&self, text: impl Into<String>) {
        self.flash(FlashKind::Success, text);
    }

    pub fn error(&self, text: impl Into<String>) {
        self.flash(FlashKind::Error, text);
    }

    pub fn take_flash(&self) -> Vec<FlashMessage> {
        let mut state = self.lock();
        let taken = state.data.take_flash();
        if !taken.is_empty() {
            state.dirty = true;
        }
        taken
    }

    pub fn set_return_to(&self, path: impl Into<String>) {
        let mut state = self.lock();
        state.data.return_to = Some(path.into());
        state.dirty = true;
    }

    pub fn take_return_to(&self) -> Option<String> {
        let mut state = self.lock();
        let taken = state.data.return_to.take();
        state.dirty |= taken.is_some();
        taken
    }

    pub fn set_oauth_state(&self, token: impl Into<String>) {
        let mut state = self.lock();
        state.data.oauth_state = Some(token.into());
        state.dirty = true;
    }

    pub fn take_oauth_state(&self) -> Option<String> {
        let mut state = self.lock();
        let taken = state.data.oauth_state.take();
        state.dirty |= taken.is_some();
        taken
    }

    /// Persists the session if it changed and drops a renewed id. Returns
    /// the id the browser should hold from now on.
    async fn commit(&self, app: &AppState) -> Option<String> {
        let (id, data, stale) = {
            let mut state = self.lock();
            if !state.dirty {
                return None;
            }
            if state.id.is_none() && state.data == SessionData::default() {
                return None;
            }
            let id = state.id.get_or_insert_with(new_session_id).clone();
            state.dirty = false;
            (id, state.data.clone(), state.stale.take())
        };

        if let Some(stale) = stale {
            if let Err(err) = app.sessions.destroy(&stale).await {
                warn!(error = %err, "failed to destroy renewed session");
            }
        }

        let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
        if let Err(err) = app.sessions.save(&id, &data, expires_at).await {
            warn!(error = %err, "failed to save session");
            return None;
        }
        Some(id)
    }
}

pub fn session_cookie(id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build()
}

/// Loads the session for this request and persists it once the response is
/// ready.
pub async fn session_layer(
    State(app): State<AppState>,
    jar: SignedCookieJar,
    mut req: Request,
    next: Next,
) -> (SignedCookieJar, Response) {
    let id = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());

    let session = match id {
        Some(id) => match app.sessions.load(&id).await {
            Ok(Some(data)) => Session::new(Some(id), data),
            Ok(None) => {
                debug!("session cookie points at an unknown or expired session");
                Session::default()
            }
            Err(err) => {
                warn!(error = %err, "failed to load session");
                Session::default()
            }
        },
        None => Session::default(),
    };

    req.extensions_mut().insert(session.clone());
    let response = next.run(req).await;
    let jar = match session.commit(&app).await {
        Some(id) => jar.add(session_cookie(id)),
        None => jar,
    };
    (jar, response)
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| DomainError::Internal("session layer is not installed".into()).into())
    }
}

async fn resolve_user(app: &AppState, session: &Session) -> Result<Option<UserSummary>, ApiError> {
    let Some(id) = session.user_id() else {
        return Ok(None);
    };
    let user = app.accounts.current_user(id).await?;
    if user.is_none() {
        debug!(user_id = %id, "session user no longer exists");
        session.log_out();
    }
    Ok(user)
}

/// The logged-in account, if any.
pub struct CurrentUser(pub Option<UserSummary>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        Ok(CurrentUser(resolve_user(state, &session).await?))
    }
}

/// Requires a logged-in account. Anonymous visitors are sent to `/login`
/// and, for page views, brought back afterwards.
pub struct AuthUser(pub UserSummary);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;
        match resolve_user(state, &session)
            .await
            .map_err(IntoResponse::into_response)?
        {
            Some(user) => Ok(AuthUser(user)),
            None => {
                if parts.method == Method::GET {
                    if let Some(target) = parts.uri.path_and_query() {
                        session.set_return_to(target.as_str());
                    }
                }
                session.error(LOGIN_REQUIRED);
                Err(Redirect::to("/login").into_response())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_adapters::session_key;
    use axum::http::header::{COOKIE, SET_COOKIE};
    use axum::http::{HeaderMap, HeaderValue};
    use axum_extra::extract::cookie::Key;

    fn signed_header(key: &Key, id: &str) -> HeaderValue {
        let response = SignedCookieJar::new(key.clone())
            .add(session_cookie(id.to_string()))
            .into_response();
        let set = response.headers()[SET_COOKIE].to_str().unwrap();
        HeaderValue::from_str(set.split(';').next().unwrap()).unwrap()
    }

    #[test]
    fn cookie_carries_security_attributes() {
        let cookie = session_cookie("abc".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(604_800)));
    }

    #[test]
    fn signed_id_reads_back_only_with_the_same_key() {
        let key = session_key(b"router-test-secret-0123456789");
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, signed_header(&key, "abc123"));

        let jar = SignedCookieJar::from_headers(&headers, key);
        assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), "abc123");

        let other = SignedCookieJar::from_headers(&headers, session_key(b"some-other-secret"));
        assert!(other.get(SESSION_COOKIE).is_none());
    }

    #[test]
    fn tampered_cookie_is_ignored() {
        let key = session_key(b"router-test-secret-0123456789");
        let signed = signed_header(&key, "abc123");
        let forged = signed.to_str().unwrap().replacen("abc123", "abc124", 1);
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(&forged).unwrap());
        assert!(SignedCookieJar::from_headers(&headers, key)
            .get(SESSION_COOKIE)
            .is_none());
    }

    #[test]
    fn log_in_renews_the_id() {
        let session = Session::new(Some("old".into()), SessionData::default());
        let user = Uuid::now_v7();
        session.log_in(user);

        let state = session.lock();
        assert_eq!(state.id, None);
        assert_eq!(state.stale.as_deref(), Some("old"));
        assert_eq!(state.data.user_id, Some(user));
        assert!(state.dirty);
    }

    #[test]
    fn reading_an_empty_flash_is_not_a_change() {
        let session = Session::default();
        assert!(session.take_flash().is_empty());
        assert!(!session.lock().dirty);

        session.error("Invalid listing ID!");
        let flashes = session.take_flash();
        assert_eq!(flashes.len(), 1);
        assert!(session.take_flash().is_empty());
    }

    #[test]
    fn log_out_keeps_pending_flash() {
        let session = Session::default();
        session.log_in(Uuid::now_v7());
        session.log_out();
        session.success("you are logged out!");
        assert_eq!(session.user_id(), None);
        assert_eq!(session.take_flash()[0].text, "you are logged out!");
    }
}
