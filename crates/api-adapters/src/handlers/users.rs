//! Local accounts: sign-up, login and logout.

use axum::extract::State;
use axum::response::Response;
use axum::Form;

use super::{flash_text, redirect, render};
use crate::error::ApiError;
use crate::forms::{LoginForm, SignupForm};
use crate::session::{CurrentUser, Session};
use crate::state::AppState;
use crate::views::{LoginPage, SignupPage};

pub const WELCOME: &str = "Welcome to Wanderlust!";
pub const WELCOME_BACK: &str = "Welcome back to Wanderlust!";
pub const LOGGED_OUT: &str = "you are logged out!";

/// Only same-site paths are honoured as a post-login target.
pub(crate) fn landing(return_to: Option<String>) -> String {
    match return_to {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") =>
        {
            path
        }
        _ => "/listings".to_string(),
    }
}

/// `GET /signup`
pub async fn signup_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, ApiError> {
    render(SignupPage {
        layout: state.layout(user, &session),
    })
}

/// `POST /signup`
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SignupForm>,
) -> Result<Response, ApiError> {
    match state.accounts.register(form.into()).await {
        Ok(user) => {
            session.log_in(user.id);
            session.success(WELCOME);
            Ok(redirect("/listings"))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect("/signup"))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /login`
pub async fn login_form(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<Response, ApiError> {
    render(LoginPage {
        layout: state.layout(user, &session),
    })
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response, ApiError> {
    match state
        .accounts
        .authenticate(&form.username, &form.password)
        .await
    {
        Ok(user) => {
            let target = landing(session.take_return_to());
            session.log_in(user.id);
            state.metrics.record_login("local");
            session.success(WELCOME_BACK);
            Ok(redirect(&target))
        }
        Err(err) if err.is_recoverable() => {
            session.error(flash_text(&err));
            Ok(redirect("/login"))
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /logout`
pub async fn logout(session: Session) -> Response {
    session.log_out();
    session.success(LOGGED_OUT);
    redirect("/listings")
}
