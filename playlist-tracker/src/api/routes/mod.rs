//! API route modules.

pub mod health;
pub mod pages;
pub mod snapshots;

use axum::Router;

use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(pages::router())
        .nest("/api/snapshots", snapshots::router())
        .nest("/health", health::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Router fixtures backed by the in-memory store.

    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, Response};
    use tower::ServiceExt;

    use crate::api::server::AppState;
    use crate::config::CredentialPaths;
    use crate::credentials::{CredentialResolver, MockConsentFlow};
    use crate::database::repositories::MemorySnapshotRepository;
    use crate::logging::LogBuffer;
    use crate::playlist::PlaylistTotals;
    use crate::scheduler::{DailyScheduler, SnapshotFetcher, TickError};

    /// Fetcher returning fixed totals and counting calls.
    #[derive(Default)]
    pub struct CountingFetcher {
        pub calls: AtomicUsize,
    }

    impl CountingFetcher {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SnapshotFetcher for CountingFetcher {
        async fn fetch_totals(&self) -> Result<PlaylistTotals, TickError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PlaylistTotals {
                video_count: 3,
                total_minutes: 42,
            })
        }
    }

    pub struct Fixture {
        pub state: AppState,
        pub repository: Arc<MemorySnapshotRepository>,
        pub fetcher: Arc<CountingFetcher>,
        pub paths: CredentialPaths,
    }

    /// State whose credential files live under `dir` (none exist yet).
    pub fn fixture(dir: &Path) -> Fixture {
        let paths = CredentialPaths {
            host_token: dir.join("host").join("token.json"),
            local_token: dir.join("token.json"),
            client_secret: dir.join("client_secret.json"),
        };
        let mut consent = MockConsentFlow::new();
        consent.expect_obtain_token().times(0);
        let resolver = Arc::new(CredentialResolver::new(
            paths.clone(),
            Arc::new(consent),
            Duration::ZERO,
        ));

        let repository = Arc::new(MemorySnapshotRepository::new());
        let fetcher = Arc::new(CountingFetcher::default());
        let scheduler = Arc::new(DailyScheduler::new(
            repository.clone(),
            fetcher.clone(),
            chrono_tz::America::Sao_Paulo,
        ));

        let state = AppState::new(repository.clone(), scheduler, resolver, LogBuffer::new(50));
        Fixture {
            state,
            repository,
            fetcher,
            paths,
        }
    }

    pub async fn get(state: &AppState, uri: &str) -> Response<Body> {
        super::create_router(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn body_string(response: Response<Body>) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
