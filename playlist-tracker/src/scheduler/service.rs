//! Daily snapshot scheduler.
//!
//! The scheduler runs one tick at startup and then one at every local midnight
//! in the configured time zone. A tick records today's snapshot unless one is
//! already stored. Failures are logged and swallowed; the next midnight is the
//! only retry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};
use youtube_data::YoutubeClient;

use crate::credentials::{CredentialError, CredentialResolver, RefreshingToken};
use crate::database::models::SnapshotDbModel;
use crate::database::repositories::SnapshotRepository;
use crate::playlist::{AggregateError, PlaylistTotals, aggregate};

use super::clock::{seconds_until_next_midnight, snapshot_key};

/// Everything that can fail inside one tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::Error),
}

/// What started a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOrigin {
    Startup,
    Midnight,
    Request,
}

impl fmt::Display for TickOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Midnight => "midnight",
            Self::Request => "request",
        })
    }
}

/// Result of one trigger.
#[derive(Debug)]
pub enum TickOutcome {
    /// Today's snapshot was fetched and stored.
    Recorded(SnapshotDbModel),
    /// A snapshot for today already existed; nothing was fetched.
    AlreadyRecorded { date: String },
    /// Another tick was running; this trigger was dropped.
    InFlight,
    /// The tick failed and nothing was stored.
    Failed { date: String, error: TickError },
}

/// Produces today's playlist totals.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    async fn fetch_totals(&self) -> Result<PlaylistTotals, TickError>;
}

/// Production fetcher: resolve credentials, build a client, aggregate.
pub struct PlaylistFetcher {
    resolver: Arc<CredentialResolver>,
    http: reqwest::Client,
    api_base: String,
    playlist_id: String,
}

impl PlaylistFetcher {
    pub fn new(
        resolver: Arc<CredentialResolver>,
        http: reqwest::Client,
        api_base: impl Into<String>,
        playlist_id: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            http,
            api_base: api_base.into(),
            playlist_id: playlist_id.into(),
        }
    }
}

#[async_trait]
impl SnapshotFetcher for PlaylistFetcher {
    async fn fetch_totals(&self) -> Result<PlaylistTotals, TickError> {
        let credential = self.resolver.resolve().await?;
        let tokens = Arc::new(RefreshingToken::new(self.http.clone(), credential.token));
        let client =
            YoutubeClient::new(self.http.clone(), tokens).with_base_url(self.api_base.as_str());

        Ok(aggregate(&client, &self.playlist_id).await?)
    }
}

/// Releases the single-flight gate when the tick ends, however it ends.
struct TickGuard<'a>(&'a AtomicBool);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to the background loop.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Token that stops the loop at its next sleep.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stop the loop and wait for it. An in-flight tick is allowed to finish.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.join.await
    }
}

/// Once-a-day snapshot recorder.
pub struct DailyScheduler {
    repository: Arc<dyn SnapshotRepository>,
    fetcher: Arc<dyn SnapshotFetcher>,
    timezone: Tz,
    in_flight: AtomicBool,
}

impl DailyScheduler {
    pub fn new(
        repository: Arc<dyn SnapshotRepository>,
        fetcher: Arc<dyn SnapshotFetcher>,
        timezone: Tz,
    ) -> Self {
        Self {
            repository,
            fetcher,
            timezone,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a tick is currently running.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn try_begin(&self) -> Option<TickGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard(&self.in_flight))
    }

    /// Run one tick unless another is already running.
    #[instrument(skip(self))]
    pub async fn tick(&self, origin: TickOrigin) -> TickOutcome {
        let Some(_guard) = self.try_begin() else {
            debug!("Tick already in flight, dropping trigger");
            return TickOutcome::InFlight;
        };

        let date = snapshot_key(Utc::now(), &self.timezone);
        match self.record(&date).await {
            Ok(Some(snapshot)) => {
                info!(
                    date = %snapshot.date,
                    videos = snapshot.video_count,
                    minutes = snapshot.total_minutes,
                    "Snapshot recorded"
                );
                TickOutcome::Recorded(snapshot)
            }
            Ok(None) => {
                info!(date = %date, "Snapshot for today already exists");
                TickOutcome::AlreadyRecorded { date }
            }
            Err(error) => {
                error!(date = %date, error = %error, "Daily snapshot failed");
                TickOutcome::Failed { date, error }
            }
        }
    }

    async fn record(&self, date: &str) -> Result<Option<SnapshotDbModel>, TickError> {
        if self.repository.exists(date).await? {
            return Ok(None);
        }

        let totals = self.fetcher.fetch_totals().await?;

        if !self
            .repository
            .insert_if_absent(date, totals.video_count, totals.total_minutes)
            .await?
        {
            return Ok(None);
        }

        let snapshot = self
            .repository
            .get(date)
            .await?
            .ok_or_else(|| crate::Error::Database(format!("snapshot {date} vanished after insert")))?;
        Ok(Some(snapshot))
    }

    /// Spawn the background loop: tick now, then sleep until each local midnight.
    pub fn start(self: Arc<Self>, cancel: CancellationToken) -> SchedulerHandle {
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            self.run_loop(token).await;
        });
        SchedulerHandle { cancel, join }
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        info!(timezone = %self.timezone, "Daily scheduler started");
        let mut origin = TickOrigin::Startup;

        loop {
            // Not raced against `cancel`: a started write always completes.
            self.tick(origin).await;
            origin = TickOrigin::Midnight;

            let secs = seconds_until_next_midnight(Utc::now(), &self.timezone);
            info!(seconds = secs, "Next snapshot check scheduled");

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Daily scheduler shutting down");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::repositories::MemorySnapshotRepository;
    use tokio::sync::Notify;

    /// Fetcher that can block mid-fetch and fail on demand.
    #[derive(Default)]
    struct GatedFetcher {
        calls: std::sync::atomic::AtomicUsize,
        gated: bool,
        fail: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl GatedFetcher {
        fn gated() -> Self {
            Self {
                gated: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotFetcher for GatedFetcher {
        async fn fetch_totals(&self) -> Result<PlaylistTotals, TickError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.entered.notify_one();
                self.release.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(AggregateError::DurationParse {
                    value: "PTXS".into(),
                }
                .into());
            }
            Ok(PlaylistTotals {
                video_count: 3,
                total_minutes: 42,
            })
        }
    }

    fn scheduler(
        fetcher: Arc<GatedFetcher>,
    ) -> (Arc<DailyScheduler>, Arc<MemorySnapshotRepository>) {
        let repo = Arc::new(MemorySnapshotRepository::new());
        let scheduler = Arc::new(DailyScheduler::new(
            repo.clone(),
            fetcher,
            chrono_tz::America::Sao_Paulo,
        ));
        (scheduler, repo)
    }

    fn today() -> String {
        snapshot_key(Utc::now(), &chrono_tz::America::Sao_Paulo)
    }

    #[tokio::test]
    async fn test_second_tick_same_day_is_skipped() {
        let fetcher = Arc::new(GatedFetcher::default());
        let (scheduler, repo) = scheduler(fetcher.clone());

        let first = scheduler.tick(TickOrigin::Startup).await;
        let second = scheduler.tick(TickOrigin::Request).await;

        match first {
            TickOutcome::Recorded(snapshot) => {
                assert_eq!(snapshot.date, today());
                assert_eq!(snapshot.video_count, 3);
                assert_eq!(snapshot.total_minutes, 42);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(second, TickOutcome::AlreadyRecorded { ref date } if *date == today()));
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_existing_snapshot_skips_fetch() {
        let fetcher = Arc::new(GatedFetcher::default());
        let (scheduler, repo) = scheduler(fetcher.clone());
        repo.insert_if_absent(&today(), 1, 1).await.unwrap();

        let outcome = scheduler.tick(TickOrigin::Midnight).await;

        assert!(matches!(outcome, TickOutcome::AlreadyRecorded { .. }));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_run_once() {
        let fetcher = Arc::new(GatedFetcher::gated());
        let (scheduler, repo) = scheduler(fetcher.clone());

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.tick(TickOrigin::Midnight).await }
        });
        fetcher.entered.notified().await;
        assert!(scheduler.is_running());

        let second = scheduler.tick(TickOrigin::Request).await;
        assert!(matches!(second, TickOutcome::InFlight));

        fetcher.release.notify_one();
        assert!(matches!(first.await.unwrap(), TickOutcome::Recorded(_)));

        assert!(!scheduler.is_running());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_next_tick_runs() {
        let fetcher = Arc::new(GatedFetcher::default());
        fetcher.fail.store(true, Ordering::SeqCst);
        let (scheduler, repo) = scheduler(fetcher.clone());

        let failed = scheduler.tick(TickOrigin::Startup).await;
        assert!(matches!(
            failed,
            TickOutcome::Failed { error: TickError::Aggregate(AggregateError::DurationParse { .. }), .. }
        ));
        assert!(repo.list_all().await.unwrap().is_empty());
        assert!(!scheduler.is_running());

        fetcher.fail.store(false, Ordering::SeqCst);
        assert!(matches!(
            scheduler.tick(TickOrigin::Midnight).await,
            TickOutcome::Recorded(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_the_tick() {
        struct NoCredentials;

        #[async_trait]
        impl SnapshotFetcher for NoCredentials {
            async fn fetch_totals(&self) -> Result<PlaylistTotals, TickError> {
                Err(CredentialError::NoCredentialSource.into())
            }
        }

        let repo = Arc::new(MemorySnapshotRepository::new());
        let scheduler = DailyScheduler::new(repo.clone(), Arc::new(NoCredentials), chrono_tz::UTC);

        let outcome = scheduler.tick(TickOrigin::Startup).await;
        assert!(matches!(
            outcome,
            TickOutcome::Failed { error: TickError::Credentials(CredentialError::NoCredentialSource), .. }
        ));
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_loop_ticks_at_startup_and_stops_promptly() {
        let fetcher = Arc::new(GatedFetcher::default());
        let (scheduler, repo) = scheduler(fetcher.clone());

        let handle = scheduler.start(CancellationToken::new());

        tokio::time::timeout(Duration::from_secs(5), async {
            while repo.list_all().await.unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("startup tick did not record a snapshot");

        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("scheduler did not stop while sleeping")
            .unwrap();
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_lets_in_flight_tick_finish() {
        let fetcher = Arc::new(GatedFetcher::gated());
        let (scheduler, repo) = scheduler(fetcher.clone());

        let handle = scheduler.start(CancellationToken::new());
        fetcher.entered.notified().await;

        handle.cancel_token().cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        fetcher.release.notify_one();
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("scheduler did not stop after the tick")
            .unwrap();

        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }
}
