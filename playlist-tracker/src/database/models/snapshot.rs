//! Playlist snapshot database model.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{Error, Result};

/// Storage format of [`SnapshotDbModel::date`].
pub const SNAPSHOT_DATE_FORMAT: &str = "%Y-%m-%d";

/// One day's measurement of the tracked playlist.
///
/// `date` is an ISO-8601 calendar date, so lexical order is chronological order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct SnapshotDbModel {
    pub date: String,
    pub video_count: i64,
    pub total_minutes: i64,
    /// Unix epoch milliseconds (UTC) of the write.
    pub created_at: i64,
}

impl SnapshotDbModel {
    /// Build a snapshot for `date`, validating the key and the counters.
    pub fn new(date: &str, video_count: u64, total_minutes: u64) -> Result<Self> {
        let date = normalize_date(date)?;
        let video_count = i64::try_from(video_count)
            .map_err(|_| Error::validation(format!("video_count out of range: {video_count}")))?;
        let total_minutes = i64::try_from(total_minutes).map_err(|_| {
            Error::validation(format!("total_minutes out of range: {total_minutes}"))
        })?;

        Ok(Self {
            date,
            video_count,
            total_minutes,
            created_at: Utc::now().timestamp_millis(),
        })
    }
}

/// Parse and re-render a snapshot key so only canonical `YYYY-MM-DD` values reach storage.
pub fn normalize_date(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date, SNAPSHOT_DATE_FORMAT)
        .map(|d| d.format(SNAPSHOT_DATE_FORMAT).to_string())
        .map_err(|_| Error::validation(format!("invalid snapshot date '{date}'")))
}
