//! # Orphan cleanup
//!
//! One-shot maintenance job: deletes every listing whose owner no longer
//! exists, then sweeps expired sessions. Safe to run repeatedly. Exits
//! non-zero if either pass failed.

use std::process::ExitCode;
use std::sync::Arc;

use configs::DatabaseSettings;
use domains::{CleanupReport, DomainResult, ListingRepository, SessionStore, UserRepository};
use services::OrphanCleanup;
use storage_adapters::{MemoryDatabase, MemorySessionStore};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "db-postgres")]
use secrecy::ExposeSecret;
#[cfg(feature = "db-postgres")]
use storage_adapters::PgDatabase;

struct Maintenance {
    orphans: CleanupReport,
    sessions_purged: u64,
}

async fn run_with(
    listings: Arc<dyn ListingRepository>,
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionStore>,
) -> DomainResult<Maintenance> {
    let orphans = OrphanCleanup::new(listings, users).run().await?;
    let sessions_purged = sessions.purge_expired().await?;
    Ok(Maintenance {
        orphans,
        sessions_purged,
    })
}

#[cfg(feature = "db-postgres")]
async fn run_postgres(settings: &DatabaseSettings) -> anyhow::Result<Maintenance> {
    let db = PgDatabase::connect(settings.uri.expose_secret(), settings.max_connections).await?;
    let shared = Arc::new(db.clone());
    let outcome = run_with(shared.clone(), shared, Arc::new(db.sessions())).await;
    // the pool is closed whether or not the pass succeeded
    db.close().await;
    info!("database connection closed");
    Ok(outcome?)
}

#[cfg(not(feature = "db-postgres"))]
async fn run_postgres(_settings: &DatabaseSettings) -> anyhow::Result<Maintenance> {
    anyhow::bail!("built without the db-postgres feature")
}

async fn run() -> anyhow::Result<Maintenance> {
    let settings = DatabaseSettings::load()?;
    if settings.is_memory() {
        warn!("DATABASE_URI is memory://; there is nothing to clean");
        let db = Arc::new(MemoryDatabase::new());
        let sessions = Arc::new(MemorySessionStore::new());
        return Ok(run_with(db.clone(), db, sessions).await?);
    }
    run_postgres(&settings).await
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    match run().await {
        Ok(Maintenance {
            orphans,
            sessions_purged,
        }) => {
            info!(
                scanned = orphans.scanned,
                orphaned = orphans.orphaned,
                deleted = orphans.deleted,
                remaining = orphans.remaining,
                sessions_purged,
                "cleanup finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "cleanup failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domains::SessionData;

    #[tokio::test]
    async fn maintenance_reports_purged_sessions() {
        let db = Arc::new(MemoryDatabase::new());
        let sessions = Arc::new(MemorySessionStore::new());
        for (id, offset) in [("gone", -5), ("kept", 600)] {
            sessions
                .save(id, &SessionData::default(), Utc::now() + Duration::seconds(offset))
                .await
                .unwrap();
        }

        let report = run_with(db.clone(), db, sessions.clone()).await.unwrap();

        assert_eq!(report.orphans.deleted, 0);
        assert_eq!(report.sessions_purged, 1);
        assert!(sessions.load("kept").await.unwrap().is_some());
    }
}
