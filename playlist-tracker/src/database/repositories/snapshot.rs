//! Snapshot repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{SnapshotDbModel, normalize_date};
use crate::database::retry::retry_on_sqlite_busy;

/// Once-per-day snapshot store.
///
/// At most one snapshot exists per date and stored rows are never overwritten.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Whether a snapshot for `date` is already stored.
    async fn exists(&self, date: &str) -> Result<bool>;

    /// Store a snapshot unless one already exists for `date`.
    ///
    /// Returns `true` if a row was written. An existing date is not an error.
    async fn insert_if_absent(&self, date: &str, video_count: u64, total_minutes: u64)
    -> Result<bool>;

    /// All snapshots ordered by date, oldest first.
    async fn list_all(&self) -> Result<Vec<SnapshotDbModel>>;

    /// Snapshot for a single date.
    async fn get(&self, date: &str) -> Result<Option<SnapshotDbModel>>;
}

/// SQLx implementation of SnapshotRepository.
pub struct SqlxSnapshotRepository {
    pool: SqlitePool,
    write_pool: SqlitePool,
}

impl SqlxSnapshotRepository {
    pub fn new(pool: SqlitePool, write_pool: SqlitePool) -> Self {
        Self { pool, write_pool }
    }
}

#[async_trait]
impl SnapshotRepository for SqlxSnapshotRepository {
    async fn exists(&self, date: &str) -> Result<bool> {
        let date = normalize_date(date)?;
        let found: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM playlist_snapshots WHERE date = ?")
                .bind(&date)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    async fn insert_if_absent(
        &self,
        date: &str,
        video_count: u64,
        total_minutes: u64,
    ) -> Result<bool> {
        let snapshot = SnapshotDbModel::new(date, video_count, total_minutes)?;

        let result = retry_on_sqlite_busy("insert_snapshot", || async {
            sqlx::query(
                r#"
                INSERT INTO playlist_snapshots (date, video_count, total_minutes, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(date) DO NOTHING
                "#,
            )
            .bind(&snapshot.date)
            .bind(snapshot.video_count)
            .bind(snapshot.total_minutes)
            .bind(snapshot.created_at)
            .execute(&self.write_pool)
            .await
            .map_err(Into::into)
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_all(&self) -> Result<Vec<SnapshotDbModel>> {
        let snapshots = sqlx::query_as::<_, SnapshotDbModel>(
            "SELECT date, video_count, total_minutes, created_at FROM playlist_snapshots ORDER BY date ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(snapshots)
    }

    async fn get(&self, date: &str) -> Result<Option<SnapshotDbModel>> {
        let date = normalize_date(date)?;
        let snapshot = sqlx::query_as::<_, SnapshotDbModel>(
            "SELECT date, video_count, total_minutes, created_at FROM playlist_snapshots WHERE date = ?",
        )
        .bind(&date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(snapshot)
    }
}

/// In-process implementation of SnapshotRepository.
///
/// Selected with `DATABASE_URL=memory`; contents are lost on exit.
#[derive(Default)]
pub struct MemorySnapshotRepository {
    rows: RwLock<BTreeMap<String, SnapshotDbModel>>,
}

impl MemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotRepository for MemorySnapshotRepository {
    async fn exists(&self, date: &str) -> Result<bool> {
        let date = normalize_date(date)?;
        Ok(self.rows.read().contains_key(&date))
    }

    async fn insert_if_absent(
        &self,
        date: &str,
        video_count: u64,
        total_minutes: u64,
    ) -> Result<bool> {
        let snapshot = SnapshotDbModel::new(date, video_count, total_minutes)?;
        let mut rows = self.rows.write();
        if rows.contains_key(&snapshot.date) {
            return Ok(false);
        }
        rows.insert(snapshot.date.clone(), snapshot);
        Ok(true)
    }

    async fn list_all(&self) -> Result<Vec<SnapshotDbModel>> {
        Ok(self.rows.read().values().cloned().collect())
    }

    async fn get(&self, date: &str) -> Result<Option<SnapshotDbModel>> {
        let date = normalize_date(date)?;
        Ok(self.rows.read().get(&date).cloned())
    }
}
