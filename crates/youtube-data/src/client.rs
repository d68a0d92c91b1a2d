use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::YoutubeError;
use crate::models::{
    ErrorEnvelope, PlaylistItemListResponse, PlaylistItemsPage, VideoDuration, VideoListResponse,
};

/// Supplies a bearer token for each request.
///
/// Implementations own expiry and refresh; the client asks for a token before
/// every call and never caches it.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, YoutubeError>;
}

/// A fixed access token, mostly useful for tests and one-off scripts.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String, YoutubeError> {
        Ok(self.0.clone())
    }
}

/// Authenticated client for the `playlistItems` and `videos` resources.
#[derive(Clone)]
pub struct YoutubeClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl YoutubeClient {
    pub const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

    /// Page size for `playlistItems.list` and the id batch limit of `videos.list`.
    pub const MAX_RESULTS: usize = 50;

    pub fn new(client: Client, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client,
            base_url: Self::BASE_URL.to_string(),
            tokens,
        }
    }

    /// Point the client at another API root (mock servers, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of playlist membership.
    #[instrument(skip(self))]
    pub async fn playlist_items_page(
        &self,
        playlist_id: &str,
        page_token: Option<&str>,
    ) -> Result<PlaylistItemsPage, YoutubeError> {
        let max_results = Self::MAX_RESULTS.to_string();
        let mut query = vec![
            ("part", "contentDetails"),
            ("playlistId", playlist_id),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response: PlaylistItemListResponse = self.get_json("playlistItems", &query).await?;
        let page = PlaylistItemsPage::from(response);
        debug!(
            items = page.video_ids.len(),
            has_next = page.next_page_token.is_some(),
            "Fetched playlist page"
        );
        Ok(page)
    }

    /// Fetch the raw durations for at most [`Self::MAX_RESULTS`] videos.
    ///
    /// Videos that were deleted or made private are silently omitted by the API.
    #[instrument(skip(self, video_ids), fields(batch = video_ids.len()))]
    pub async fn video_durations(
        &self,
        video_ids: &[String],
    ) -> Result<Vec<VideoDuration>, YoutubeError> {
        if video_ids.is_empty() {
            return Ok(Vec::new());
        }
        if video_ids.len() > Self::MAX_RESULTS {
            return Err(YoutubeError::BatchTooLarge(video_ids.len()));
        }

        let ids = video_ids.join(",");
        let max_results = Self::MAX_RESULTS.to_string();
        let query = [
            ("part", "contentDetails"),
            ("id", ids.as_str()),
            ("maxResults", max_results.as_str()),
        ];

        let response: VideoListResponse = self.get_json("videos", &query).await?;
        Ok(response.items.into_iter().map(VideoDuration::from).collect())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<T, YoutubeError> {
        let token = self.tokens.access_token().await?;
        let url = format!("{}/{}", self.base_url, resource);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn api_error(status: StatusCode, body: &str) -> YoutubeError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => YoutubeError::Api {
            status: status.as_u16(),
            reason: envelope.error.errors.into_iter().find_map(|e| e.reason),
            message: envelope.error.message,
        },
        Err(_) => {
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("unknown").to_string()
            } else {
                body.trim().chars().take(256).collect()
            };
            YoutubeError::Api {
                status: status.as_u16(),
                reason: None,
                message,
            }
        }
    }
}
