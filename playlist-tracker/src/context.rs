//! Application context.
//!
//! `AppContext` is built once in `main` and owns every long-lived service:
//! the snapshot store, the shared HTTP client, the credential resolver and the
//! daily scheduler. Everything else borrows from it through `Arc`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AppConfig;
use crate::credentials::{CredentialResolver, InstalledAppFlow};
use crate::database::repositories::{
    MemorySnapshotRepository, SnapshotRepository, SqlxSnapshotRepository,
};
use crate::database::{self, DbPool};
use crate::logging::LogBuffer;
use crate::scheduler::{DailyScheduler, PlaylistFetcher, SchedulerHandle};
use crate::utils::build_http_client;
use crate::Result;

/// Long-lived services shared by the scheduler and the HTTP surface.
pub struct AppContext {
    pub config: AppConfig,
    /// `None` when the in-memory store is selected.
    pub pool: Option<DbPool>,
    pub repository: Arc<dyn SnapshotRepository>,
    pub http_client: reqwest::Client,
    pub resolver: Arc<CredentialResolver>,
    pub scheduler: Arc<DailyScheduler>,
    pub log_buffer: LogBuffer,
    cancellation_token: CancellationToken,
}

impl AppContext {
    /// Open the snapshot store and wire the services together.
    pub async fn build(config: AppConfig, log_buffer: LogBuffer) -> Result<Self> {
        info!(
            playlist_id = %config.playlist_id,
            timezone = %config.timezone,
            "Initializing application context"
        );

        let http_client = build_http_client(config.http_timeout)?;

        let (pool, repository): (Option<DbPool>, Arc<dyn SnapshotRepository>) =
            if config.uses_memory_store() {
                info!("Using in-memory snapshot store; snapshots will not survive a restart");
                (None, Arc::new(MemorySnapshotRepository::new()))
            } else {
                let pool = database::init_pool(&config.database_url).await?;
                let write_pool = database::init_write_pool(&config.database_url).await?;
                database::run_migrations(&write_pool).await?;
                (
                    Some(pool.clone()),
                    Arc::new(SqlxSnapshotRepository::new(pool, write_pool)),
                )
            };

        let consent = Arc::new(InstalledAppFlow::new(
            http_client.clone(),
            config.consent_timeout,
        ));
        let resolver = Arc::new(CredentialResolver::new(
            config.credentials.clone(),
            consent,
            config.consent_settle_delay,
        ));

        let fetcher = Arc::new(PlaylistFetcher::new(
            resolver.clone(),
            http_client.clone(),
            config.youtube_api_base.as_str(),
            config.playlist_id.as_str(),
        ));
        let scheduler = Arc::new(DailyScheduler::new(
            repository.clone(),
            fetcher,
            config.timezone,
        ));

        info!("Application context initialized");

        Ok(Self {
            config,
            pool,
            repository,
            http_client,
            resolver,
            scheduler,
            log_buffer,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Root token; cancelling it stops every background task.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Start the background daily loop unless it is disabled.
    pub fn start_scheduler(&self) -> Option<SchedulerHandle> {
        if !self.config.scheduler_enabled {
            info!("Background scheduler disabled; snapshots are taken on first page view only");
            return None;
        }
        Some(
            self.scheduler
                .clone()
                .start(self.cancellation_token.child_token()),
        )
    }

    /// Cancel background work and close the database pool.
    pub async fn shutdown(&self, scheduler: Option<SchedulerHandle>) {
        info!("Shutting down application context");
        self.cancellation_token.cancel();

        if let Some(handle) = scheduler
            && let Err(e) = handle.shutdown().await
        {
            tracing::warn!(error = %e, "Scheduler task ended abnormally");
        }

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
        info!("Application context shut down");
    }
}
