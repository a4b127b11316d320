//! # OAuth identity providers
//!
//! Authorization-code flow against GitHub and Google. Each provider builds
//! the consent URL, then trades the callback code for an access token and
//! fetches the signed-in user's profile.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::{DomainError, DomainResult, IdentityProvider, OAuthProfile, OAuthProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

const USER_AGENT: &str = concat!("wanderlust/", env!("CARGO_PKG_VERSION"));

/// Registered application credentials for one provider.
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    fn into_token(self, provider: OAuthProvider) -> DomainResult<String> {
        match self.access_token {
            Some(token) => Ok(token),
            None => {
                let reason = self
                    .error_description
                    .or(self.error)
                    .unwrap_or_else(|| "no access token".into());
                warn!(provider = provider.slug(), %reason, "token exchange refused");
                Err(DomainError::Unauthorized(format!(
                    "{} sign-in failed",
                    provider.display_name()
                )))
            }
        }
    }
}

fn http_client() -> DomainResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|e| DomainError::Internal(format!("http client: {e}")))
}

fn upstream(provider: OAuthProvider) -> impl Fn(reqwest::Error) -> DomainError {
    move |e| DomainError::Internal(format!("{} request failed: {e}", provider.display_name()))
}

fn consent_url(base: &str, params: &[(&str, &str)]) -> String {
    match Url::parse_with_params(base, params) {
        Ok(url) => url.into(),
        // base is a constant; keep the unparsed form rather than fail a redirect
        Err(_) => base.to_string(),
    }
}

// ── GitHub ──────────────────────────────────────────────────────────────────

pub struct GitHubProvider {
    config: OAuthClientConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    email: Option<String>,
}

impl From<GitHubUser> for OAuthProfile {
    fn from(user: GitHubUser) -> Self {
        OAuthProfile {
            provider: OAuthProvider::GitHub,
            external_id: user.id.to_string(),
            username: user.login,
            email: user.email,
        }
    }
}

impl GitHubProvider {
    const AUTHORIZE: &'static str = "https://github.com/login/oauth/authorize";
    const TOKEN: &'static str = "https://github.com/login/oauth/access_token";
    const PROFILE: &'static str = "https://api.github.com/user";

    pub fn new(config: OAuthClientConfig) -> DomainResult<Self> {
        Ok(Self {
            config,
            http: http_client()?,
        })
    }
}

#[async_trait]
impl IdentityProvider for GitHubProvider {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::GitHub
    }

    fn authorize_url(&self, state: &str) -> String {
        consent_url(
            Self::AUTHORIZE,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("scope", "read:user user:email"),
                ("state", state),
            ],
        )
    }

    async fn exchange(&self, code: &str) -> DomainResult<OAuthProfile> {
        let err = upstream(OAuthProvider::GitHub);
        let token = self
            .http
            .post(Self::TOKEN)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("code", code),
                ("redirect_uri", self.config.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(&err)?
            .json::<TokenResponse>()
            .await
            .map_err(&err)?
            .into_token(OAuthProvider::GitHub)?;

        let user: GitHubUser = self
            .http
            .get(Self::PROFILE)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(&err)?
            .error_for_status()
            .map_err(&err)?
            .json()
            .await
            .map_err(&err)?;
        debug!(login = %user.login, "github profile fetched");
        Ok(user.into())
    }
}

// ── Google ──────────────────────────────────────────────────────────────────

pub struct GoogleProvider {
    config: OAuthClientConfig,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    sub: String,
    name: Option<String>,
    email: Option<String>,
}

impl From<GoogleUser> for OAuthProfile {
    fn from(user: GoogleUser) -> Self {
        // Prefer the mailbox name as a handle; display names contain spaces.
        let username = user
            .email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .map(str::to_string)
            .or(user.name)
            .unwrap_or_default();
        OAuthProfile {
            provider: OAuthProvider::Google,
            external_id: user.sub,
            username,
            email: user.email,
        }
    }
}

impl GoogleProvider {
    const AUTHORIZE: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN: &'static str = "https://oauth2.googleapis.com/token";
    const PROFILE: &'static str = "https://openidconnect.googleapis.com/v1/userinfo";

    pub fn new(config: OAuthClientConfig) -> DomainResult<Self> {
        Ok(Self {
            config,
            http: http_client()?,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn provider(&self) -> OAuthProvider {
        OAuthProvider::Google
    }

    fn authorize_url(&self, state: &str) -> String {
        consent_url(
            Self::AUTHORIZE,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("state", state),
            ],
        )
    }

    async fn exchange(&self, code: &str) -> DomainResult<OAuthProfile> {
        let err = upstream(OAuthProvider::Google);
        let token = self
            .http
            .post(Self::TOKEN)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret()),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(&err)?
            .json::<TokenResponse>()
            .await
            .map_err(&err)?
            .into_token(OAuthProvider::Google)?;

        let user: GoogleUser = self
            .http
            .get(Self::PROFILE)
            .bearer_auth(token)
            .send()
            .await
            .map_err(&err)?
            .error_for_status()
            .map_err(&err)?
            .json()
            .await
            .map_err(&err)?;
        debug!(sub = %user.sub, "google profile fetched");
        Ok(user.into())
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

/// The providers that are configured for this deployment. Unconfigured ones
/// are simply absent.
#[derive(Clone, Default)]
pub struct OAuthProviders {
    providers: HashMap<OAuthProvider, Arc<dyn IdentityProvider>>,
}

impl OAuthProviders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.providers.insert(provider.provider(), provider);
        self
    }

    pub fn get(&self, provider: OAuthProvider) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(&provider).cloned()
    }

    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.providers.contains_key(&provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthClientConfig {
        OAuthClientConfig {
            client_id: "client-123".into(),
            client_secret: SecretString::from("shh".to_string()),
            callback_url: "http://localhost:8080/auth/github/callback".into(),
        }
    }

    #[test]
    fn github_consent_url_carries_state_and_callback() {
        let gh = GitHubProvider::new(config()).unwrap();
        let url = Url::parse(&gh.authorize_url("xyz")).unwrap();
        assert_eq!(url.host_str(), Some("github.com"));
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "client-123");
        assert_eq!(pairs["state"], "xyz");
        assert_eq!(pairs["redirect_uri"], "http://localhost:8080/auth/github/callback");
    }

    #[test]
    fn google_consent_url_requests_code() {
        let google = GoogleProvider::new(config()).unwrap();
        let url = Url::parse(&google.authorize_url("s")).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["response_type"], "code");
        assert!(pairs["scope"].contains("email"));
    }

    #[test]
    fn github_profile_maps_numeric_id() {
        let user: GitHubUser =
            serde_json::from_str(r#"{"id":583231,"login":"octocat","email":null}"#).unwrap();
        let profile = OAuthProfile::from(user);
        assert_eq!(profile.external_id, "583231");
        assert_eq!(profile.username, "octocat");
        assert_eq!(profile.email, None);
    }

    #[test]
    fn google_profile_prefers_mailbox_name() {
        let user: GoogleUser = serde_json::from_str(
            r#"{"sub":"1098","name":"Ada Lovelace","email":"ada@example.com"}"#,
        )
        .unwrap();
        let profile = OAuthProfile::from(user);
        assert_eq!(profile.username, "ada");
        assert_eq!(profile.external_id, "1098");
    }

    #[test]
    fn refused_token_is_unauthorized() {
        let body = TokenResponse {
            access_token: None,
            error: Some("bad_verification_code".into()),
            error_description: None,
        };
        assert_eq!(
            body.into_token(OAuthProvider::GitHub),
            Err(DomainError::Unauthorized("GitHub sign-in failed".into()))
        );
    }

    #[test]
    fn registry_only_knows_configured_providers() {
        let registry =
            OAuthProviders::new().with(Arc::new(GitHubProvider::new(config()).unwrap()));
        assert!(registry.is_enabled(OAuthProvider::GitHub));
        assert!(registry.get(OAuthProvider::Google).is_none());
    }
}
