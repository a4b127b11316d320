//! # configs
//!
//! Runtime settings for the Wanderlust binaries.
//!
//! Sources, lowest to highest precedence:
//! 1. `config/wanderlust.toml` (optional)
//! 2. process environment (`DATABASE_URI`, `SECRET`, ...)
//!
//! `.env` is read into the environment first unless `APP_ENV=production`.
//! Keys are flat; an environment variable `FOO_BAR` overrides `foo_bar` in
//! the file. Empty values count as unset.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, Environment, File};
use domains::OwnershipPolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const CONFIG_FILE: &str = "config/wanderlust";
const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("could not read configuration: {0}")]
    Source(#[from] config::ConfigError),
}

fn invalid(key: &'static str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

/// Everything as it arrives from the sources: flat, stringly and optional.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    database_uri: Option<String>,
    database_max_connections: Option<String>,
    secret: Option<String>,
    cloud_name: Option<String>,
    cloud_api_key: Option<String>,
    cloud_api_secret: Option<String>,
    github_client_id: Option<String>,
    github_client_secret: Option<String>,
    github_callback_url: Option<String>,
    google_client_id: Option<String>,
    google_client_secret: Option<String>,
    google_callback_url: Option<String>,
    host: Option<String>,
    port: Option<String>,
    upload_dir: Option<String>,
    public_dir: Option<String>,
    max_upload_bytes: Option<String>,
    ownership_policy: Option<String>,
    log_format: Option<String>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &Option<String>, key: &'static str) -> Result<String, ConfigError> {
    present(value).ok_or(ConfigError::Missing(key))
}

fn parsed<T>(value: &Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match present(value) {
        Some(v) => v.parse().map_err(|e| invalid(key, e)),
        None => Ok(default),
    }
}

/// Loads the optional file and the environment into one flat map.
fn sources() -> Result<Config, ConfigError> {
    let production = std::env::var("APP_ENV").is_ok_and(|v| v == "production");
    if !production {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
    }
    Ok(Config::builder()
        .add_source(File::with_name(CONFIG_FILE).required(false))
        .add_source(Environment::default())
        .build()?)
}

// ── Sections ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("expected \"pretty\" or \"json\", got {other:?}")),
        }
    }
}

#[derive(Debug)]
pub struct ServerSettings {
    pub host: IpAddr,
    pub port: u16,
    pub public_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerSettings {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug)]
pub struct DatabaseSettings {
    pub uri: SecretString,
    pub max_connections: u32,
}

impl DatabaseSettings {
    /// Reads only what the maintenance binaries need.
    pub fn load() -> Result<Self, ConfigError> {
        let raw: RawSettings = sources()?.try_deserialize()?;
        Self::from_raw(&raw)
    }

    fn from_raw(raw: &RawSettings) -> Result<Self, ConfigError> {
        let uri = required(&raw.database_uri, "DATABASE_URI")?;
        let max_connections = parsed(&raw.database_max_connections, "DATABASE_MAX_CONNECTIONS", 10)?;
        if max_connections == 0 {
            return Err(invalid("DATABASE_MAX_CONNECTIONS", "must be at least 1"));
        }
        Ok(Self {
            uri: SecretString::from(uri),
            max_connections,
        })
    }

    /// `memory://` selects the non-persistent in-process backend.
    pub fn is_memory(&self) -> bool {
        self.uri.expose_secret().starts_with("memory://")
    }
}

#[derive(Debug)]
pub struct CloudinarySettings {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
}

#[derive(Debug)]
pub struct MediaSettings {
    pub upload_dir: PathBuf,
    /// `None` stores uploads under `upload_dir`.
    pub cloudinary: Option<CloudinarySettings>,
}

#[derive(Debug)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: SecretString,
    pub callback_url: String,
}

#[derive(Debug, Default)]
pub struct OAuthSettings {
    pub github: Option<OAuthApp>,
    pub google: Option<OAuthApp>,
}

#[derive(Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub session_secret: SecretString,
    pub media: MediaSettings,
    pub oauth: OAuthSettings,
    pub ownership_policy: OwnershipPolicy,
    pub log_format: LogFormat,
    /// Non-fatal findings (disabled optional groups), logged once tracing
    /// is up.
    pub notices: Vec<String>,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_config(sources()?)
    }

    /// Builds settings from an already assembled source.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        let raw: RawSettings = config.try_deserialize()?;
        Self::from_raw(&raw)
    }

    fn from_raw(raw: &RawSettings) -> Result<Self, ConfigError> {
        let mut notices = Vec::new();

        let database = DatabaseSettings::from_raw(raw)?;

        let secret = required(&raw.secret, "SECRET")?;
        if secret.len() < MIN_SECRET_LEN {
            return Err(invalid(
                "SECRET",
                format!("must be at least {MIN_SECRET_LEN} bytes"),
            ));
        }

        let server = ServerSettings {
            host: parsed(&raw.host, "HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parsed(&raw.port, "PORT", 8080)?,
            public_dir: PathBuf::from(present(&raw.public_dir).unwrap_or_else(|| "./public".into())),
            max_upload_bytes: parsed(&raw.max_upload_bytes, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        };

        let cloudinary = match (
            present(&raw.cloud_name),
            present(&raw.cloud_api_key),
            present(&raw.cloud_api_secret),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinarySettings {
                cloud_name,
                api_key,
                api_secret: SecretString::from(api_secret),
            }),
            (None, None, None) => {
                notices.push("Cloudinary not configured; storing uploads on local disk".into());
                None
            }
            _ => {
                notices.push(
                    "Cloudinary partially configured (need CLOUD_NAME, CLOUD_API_KEY and \
                     CLOUD_API_SECRET); storing uploads on local disk"
                        .into(),
                );
                None
            }
        };
        let media = MediaSettings {
            upload_dir: PathBuf::from(
                present(&raw.upload_dir).unwrap_or_else(|| "./data/uploads".into()),
            ),
            cloudinary,
        };

        let oauth = OAuthSettings {
            github: oauth_app(
                "GITHUB",
                [&raw.github_client_id, &raw.github_client_secret, &raw.github_callback_url],
                &mut notices,
            ),
            google: oauth_app(
                "GOOGLE",
                [&raw.google_client_id, &raw.google_client_secret, &raw.google_callback_url],
                &mut notices,
            ),
        };

        Ok(Self {
            server,
            database,
            session_secret: SecretString::from(secret),
            media,
            oauth,
            ownership_policy: parsed(
                &raw.ownership_policy,
                "OWNERSHIP_POLICY",
                OwnershipPolicy::default(),
            )?,
            log_format: parsed(&raw.log_format, "LOG_FORMAT", LogFormat::default())?,
            notices,
        })
    }
}

/// All three of `<PREFIX>_CLIENT_ID`, `_CLIENT_SECRET`, `_CALLBACK_URL` or
/// the provider stays off.
fn oauth_app(
    prefix: &str,
    [id, secret, callback]: [&Option<String>; 3],
    notices: &mut Vec<String>,
) -> Option<OAuthApp> {
    match (present(id), present(secret), present(callback)) {
        (Some(client_id), Some(client_secret), Some(callback_url)) => Some(OAuthApp {
            client_id,
            client_secret: SecretString::from(client_secret),
            callback_url,
        }),
        (None, None, None) => None,
        _ => {
            notices.push(format!(
                "{prefix} OAuth partially configured (need {prefix}_CLIENT_ID, \
                 {prefix}_CLIENT_SECRET and {prefix}_CALLBACK_URL); provider disabled"
            ));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> config::builder::ConfigBuilder<config::builder::DefaultState> {
        Config::builder()
            .set_override("database_uri", "memory://")
            .unwrap()
            .set_override("secret", "0123456789abcdef")
            .unwrap()
    }

    fn load(builder: config::builder::ConfigBuilder<config::builder::DefaultState>) -> Result<Settings, ConfigError> {
        Settings::from_config(builder.build().unwrap())
    }

    #[test]
    fn defaults_apply() {
        let settings = load(base()).unwrap();
        assert_eq!(settings.server.addr().to_string(), "0.0.0.0:8080");
        assert_eq!(settings.server.max_upload_bytes, 10_485_760);
        assert_eq!(settings.media.upload_dir, PathBuf::from("./data/uploads"));
        assert_eq!(settings.ownership_policy, OwnershipPolicy::Permissive);
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert!(settings.database.is_memory());
        assert!(settings.media.cloudinary.is_none());
        assert!(settings.oauth.github.is_none());
    }

    #[test]
    fn missing_database_uri_names_the_variable() {
        let err = load(Config::builder().set_override("secret", "0123456789abcdef").unwrap())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URI")));
        assert_eq!(err.to_string(), "missing required setting DATABASE_URI");
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = load(base().set_override("secret", "   ").unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SECRET")));
    }

    #[test]
    fn short_secret_is_rejected() {
        let err = load(base().set_override("secret", "short").unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SECRET", .. }));
    }

    #[test]
    fn bad_port_is_invalid() {
        let err = load(base().set_override("port", "eighty").unwrap()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn partial_cloudinary_is_disabled_with_notice() {
        let settings = load(base().set_override("cloud_name", "demo").unwrap()).unwrap();
        assert!(settings.media.cloudinary.is_none());
        assert!(settings.notices.iter().any(|n| n.contains("partially configured")));
    }

    #[test]
    fn complete_oauth_group_enables_provider() {
        let settings = load(
            base()
                .set_override("github_client_id", "id")
                .unwrap()
                .set_override("github_client_secret", "secret")
                .unwrap()
                .set_override("github_callback_url", "http://localhost:8080/auth/github/callback")
                .unwrap(),
        )
        .unwrap();
        let gh = settings.oauth.github.unwrap();
        assert_eq!(gh.client_id, "id");
        assert_eq!(gh.client_secret.expose_secret(), "secret");
        assert!(settings.oauth.google.is_none());
    }

    #[test]
    fn policy_and_log_format_parse() {
        let settings = load(
            base()
                .set_override("ownership_policy", "Enforced")
                .unwrap()
                .set_override("log_format", "json")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(settings.ownership_policy, OwnershipPolicy::Enforced);
        assert_eq!(settings.log_format, LogFormat::Json);
    }
}
