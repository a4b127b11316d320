//! # Wanderlust server
//!
//! Assembles the application from configuration: picks the store
//! (`memory://` or PostgreSQL), the media backend (Cloudinary or local
//! disk) and whichever identity providers are configured, then serves the
//! router until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use api_adapters::{build_router, AppState, Metrics, RouterConfig};
use auth_adapters::{
    session_key, Argon2Hasher, GitHubProvider, GoogleProvider, OAuthClientConfig, OAuthProviders,
};
use configs::{DatabaseSettings, LogFormat, MediaSettings, OAuthApp, OAuthSettings, Settings};
use domains::{ListingRepository, MediaStorage, ReviewRepository, SessionStore, UserRepository};
use secrecy::ExposeSecret;
use services::{AccountService, ListingService, ReviewService};
use storage_adapters::{LocalMediaStorage, MemoryDatabase, MemorySessionStore};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[cfg(feature = "db-postgres")]
use storage_adapters::PgDatabase;

/// URL prefix local uploads are served under.
const MEDIA_PREFIX: &str = "/media";
const SESSION_SWEEP_EVERY: Duration = Duration::from_secs(60 * 60);

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
    }
}

/// The persistence ports, all backed by the same store.
struct Store {
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    reviews: Arc<dyn ReviewRepository>,
    sessions: Arc<dyn SessionStore>,
    #[cfg(feature = "db-postgres")]
    pool: Option<PgDatabase>,
}

impl Store {
    async fn open(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        if settings.is_memory() {
            warn!("DATABASE_URI is memory://; nothing will survive a restart");
            let db = Arc::new(MemoryDatabase::new());
            return Ok(Self {
                listings: db.clone(),
                users: db.clone(),
                reviews: db,
                sessions: Arc::new(MemorySessionStore::new()),
                #[cfg(feature = "db-postgres")]
                pool: None,
            });
        }

        open_postgres(settings).await
    }

    async fn close(&self) {
        #[cfg(feature = "db-postgres")]
        {
            if let Some(db) = &self.pool {
                db.close().await;
            }
        }
    }
}

#[cfg(feature = "db-postgres")]
async fn open_postgres(settings: &DatabaseSettings) -> anyhow::Result<Store> {
    let db = PgDatabase::connect(settings.uri.expose_secret(), settings.max_connections)
        .await
        .context("connecting to postgres")?;
    db.migrate().await.context("running migrations")?;
    let sessions = Arc::new(db.sessions());
    let shared = Arc::new(db.clone());
    Ok(Store {
        listings: shared.clone(),
        users: shared.clone(),
        reviews: shared,
        sessions,
        pool: Some(db),
    })
}

#[cfg(not(feature = "db-postgres"))]
async fn open_postgres(_settings: &DatabaseSettings) -> anyhow::Result<Store> {
    Err(anyhow::anyhow!(
        "built without the db-postgres feature; only DATABASE_URI=memory:// is supported"
    ))
}

/// Cloudinary when configured, otherwise files under `upload_dir` served
/// at `/media`. The second value is the directory to serve, if any.
fn media_storage(
    settings: MediaSettings,
) -> anyhow::Result<(Arc<dyn MediaStorage>, Option<std::path::PathBuf>)> {
    #[cfg(feature = "media-cloudinary")]
    {
        use storage_adapters::{CloudinaryCredentials, CloudinaryStorage};

        if let Some(cloud) = settings.cloudinary {
            info!(cloud_name = %cloud.cloud_name, "storing uploads on Cloudinary");
            let storage = CloudinaryStorage::new(CloudinaryCredentials {
                cloud_name: cloud.cloud_name,
                api_key: cloud.api_key,
                api_secret: cloud.api_secret,
            })?;
            return Ok((Arc::new(storage), None));
        }
    }

    info!(dir = %settings.upload_dir.display(), "storing uploads on local disk");
    let storage = LocalMediaStorage::new(&settings.upload_dir, MEDIA_PREFIX);
    Ok((Arc::new(storage), Some(settings.upload_dir)))
}

fn client_config(app: OAuthApp) -> OAuthClientConfig {
    OAuthClientConfig {
        client_id: app.client_id,
        client_secret: app.client_secret,
        callback_url: app.callback_url,
    }
}

fn identity_providers(settings: OAuthSettings) -> anyhow::Result<OAuthProviders> {
    let mut providers = OAuthProviders::new();
    if let Some(app) = settings.github {
        providers = providers.with(Arc::new(GitHubProvider::new(client_config(app))?));
        info!("GitHub login enabled");
    }
    if let Some(app) = settings.google {
        providers = providers.with(Arc::new(GoogleProvider::new(client_config(app))?));
        info!("Google login enabled");
    }
    Ok(providers)
}

/// Periodically drops expired sessions. The in-memory store has no other
/// way to shed them; for PostgreSQL the `cleanup` job does the same.
fn spawn_session_sweep(sessions: Arc<dyn SessionStore>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_EVERY);
        loop {
            tick.tick().await;
            match sessions.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired sessions swept"),
                Err(err) => warn!(error = %err, "session sweep failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("received Ctrl+C, shutting down"),
            Err(err) => {
                error!(error = %err, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => {
            init_tracing(LogFormat::default());
            error!(error = %err, "invalid configuration");
            return Err(err.into());
        }
    };
    init_tracing(settings.log_format);
    for notice in &settings.notices {
        warn!("{notice}");
    }

    let Settings {
        server,
        database,
        session_secret,
        media,
        oauth,
        ownership_policy,
        ..
    } = settings;

    let store = Store::open(&database).await?;
    spawn_session_sweep(store.sessions.clone());
    let (media, upload_dir) = media_storage(media)?;
    info!(policy = ?ownership_policy, "ownership policy");

    let state = AppState {
        listings: ListingService::new(
            store.listings.clone(),
            store.users.clone(),
            store.reviews.clone(),
            media,
            ownership_policy,
        ),
        reviews: ReviewService::new(store.listings.clone(), store.reviews.clone(), ownership_policy),
        accounts: AccountService::new(store.users.clone(), Arc::new(Argon2Hasher::default())),
        sessions: store.sessions.clone(),
        cookie_key: session_key(session_secret.expose_secret().as_bytes()),
        oauth: identity_providers(oauth)?,
        metrics: Arc::new(Metrics::new()),
    };

    let app = build_router(
        state,
        RouterConfig {
            public_dir: server.public_dir.clone(),
            upload_dir,
            max_upload_bytes: server.max_upload_bytes,
        },
    );

    let addr = server.addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "wanderlust listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    store.close().await;
    served.context("server error")?;
    info!("server stopped");
    Ok(())
}
