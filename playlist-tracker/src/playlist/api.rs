//! Upstream seam used by the aggregator.

use async_trait::async_trait;
use youtube_data::{PlaylistItemsPage, YoutubeClient, YoutubeError};

/// The two Data API calls an aggregation pass needs.
#[async_trait]
pub trait PlaylistApi: Send + Sync {
    /// One page (up to 50 entries) of playlist membership.
    async fn list_playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage, YoutubeError>;

    /// Raw ISO-8601 durations for at most 50 video ids.
    async fn video_durations(&self, video_ids: &[String]) -> Result<Vec<String>, YoutubeError>;
}

#[async_trait]
impl PlaylistApi for YoutubeClient {
    async fn list_playlist_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage, YoutubeError> {
        self.playlist_items_page(playlist_id, page_token).await
    }

    async fn video_durations(&self, video_ids: &[String]) -> Result<Vec<String>, YoutubeError> {
        let durations = YoutubeClient::video_durations(self, video_ids).await?;
        Ok(durations.into_iter().map(|d| d.duration).collect())
    }
}
