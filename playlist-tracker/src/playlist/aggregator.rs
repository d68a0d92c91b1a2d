//! Paginated fetch-and-aggregate over one playlist.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};
use youtube_data::{YoutubeClient, YoutubeError, parse_iso8601_duration};

use super::api::PlaylistApi;

/// Size and runtime of a playlist at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlaylistTotals {
    pub video_count: u64,
    /// Floor of the summed durations in minutes.
    pub total_minutes: u64,
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("YouTube API error: {0}")]
    Upstream(#[from] YoutubeError),

    #[error("Unparseable video duration '{value}'")]
    DurationParse { value: String },

    #[error("Total playlist duration overflowed")]
    Overflow,

    #[error("Playlist pagination repeated page token '{0}'")]
    PaginationLoop(String),
}

/// Working state of one aggregation pass.
#[derive(Debug, Default)]
pub struct AggregationPass {
    video_ids: Vec<String>,
    total_seconds: u64,
}

impl AggregationPass {
    pub fn video_ids(&self) -> &[String] {
        &self.video_ids
    }

    pub fn totals(&self) -> PlaylistTotals {
        PlaylistTotals {
            video_count: self.video_ids.len() as u64,
            total_minutes: self.total_seconds / 60,
        }
    }
}

fn duration_seconds(raw: &str) -> Result<u64, AggregateError> {
    parse_iso8601_duration(raw).map_err(|_| AggregateError::DurationParse {
        value: raw.to_string(),
    })
}

/// Count the videos in `playlist_id` and sum their durations.
///
/// Video ids are collected in listing order across all pages, then durations
/// are fetched in batches of at most 50. Any upstream error or unparseable
/// duration aborts the pass; no partial totals are returned.
#[instrument(skip(api))]
pub async fn aggregate<A>(api: &A, playlist_id: &str) -> Result<PlaylistTotals, AggregateError>
where
    A: PlaylistApi + ?Sized,
{
    let mut pass = AggregationPass::default();

    let mut page_token: Option<String> = None;
    let mut seen_tokens = HashSet::new();
    let mut pages = 0usize;
    loop {
        let page = api
            .list_playlist_page(playlist_id, page_token.as_deref())
            .await?;
        pages += 1;
        pass.video_ids.extend(page.video_ids);

        match page.next_page_token {
            Some(next) => {
                if !seen_tokens.insert(next.clone()) {
                    return Err(AggregateError::PaginationLoop(next));
                }
                page_token = Some(next);
            }
            None => break,
        }
    }
    debug!(pages, videos = pass.video_ids.len(), "Collected playlist membership");

    let mut batches = 0usize;
    for chunk in pass.video_ids.chunks(YoutubeClient::MAX_RESULTS) {
        let durations = api.video_durations(chunk).await?;
        batches += 1;
        for raw in &durations {
            pass.total_seconds = pass
                .total_seconds
                .checked_add(duration_seconds(raw)?)
                .ok_or(AggregateError::Overflow)?;
        }
    }

    let totals = pass.totals();
    info!(
        videos = totals.video_count,
        minutes = totals.total_minutes,
        batches,
        "Playlist aggregated"
    );
    Ok(totals)
}
