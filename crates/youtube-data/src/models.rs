//! Wire models for the subset of the Data API we consume.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaylistItemListResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaylistItem {
    pub content_details: PlaylistItemContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaylistItemContentDetails {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Video {
    pub id: String,
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VideoContentDetails {
    /// ISO-8601, e.g. `PT4M13S`.
    pub duration: String,
}

/// Google API error envelope: `{"error": {"code": 403, "message": "...", "errors": [{"reason": "..."}]}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorDetail {
    pub reason: Option<String>,
}

/// One page of `playlistItems.list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistItemsPage {
    /// Video ids in listing order.
    pub video_ids: Vec<String>,
    /// Continuation cursor; `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Raw duration of one video as reported by `videos.list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDuration {
    pub video_id: String,
    pub duration: String,
}

impl From<PlaylistItemListResponse> for PlaylistItemsPage {
    fn from(response: PlaylistItemListResponse) -> Self {
        Self {
            video_ids: response
                .items
                .into_iter()
                .map(|item| item.content_details.video_id)
                .collect(),
            next_page_token: response.next_page_token.filter(|token| !token.is_empty()),
        }
    }
}

impl From<Video> for VideoDuration {
    fn from(video: Video) -> Self {
        Self {
            video_id: video.id,
            duration: video.content_details.duration,
        }
    }
}
