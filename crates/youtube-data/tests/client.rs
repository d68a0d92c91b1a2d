//! HTTP-level tests for `YoutubeClient` against a mock Data API.

use std::sync::Arc;

use wiremock::matchers::{header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};
use youtube_data::{StaticToken, YoutubeClient, YoutubeError};

async fn setup() -> (MockServer, YoutubeClient) {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let server = MockServer::start().await;
    let client = YoutubeClient::new(reqwest::Client::new(), Arc::new(StaticToken::new("test-token")))
        .with_base_url(format!("{}/youtube/v3", server.uri()));
    (server, client)
}

#[tokio::test]
async fn first_page_has_no_page_token_and_sends_bearer() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("playlistId", "PL123"))
        .and(query_param("part", "contentDetails"))
        .and(query_param("maxResults", "50"))
        .and(query_param_is_missing("pageToken"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "NEXT",
            "items": [
                {"contentDetails": {"videoId": "a"}},
                {"contentDetails": {"videoId": "b"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.playlist_items_page("PL123", None).await.unwrap();
    assert_eq!(page.video_ids, vec!["a", "b"]);
    assert_eq!(page.next_page_token.as_deref(), Some("NEXT"));
}

#[tokio::test]
async fn continuation_page_forwards_cursor() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .and(query_param("pageToken", "NEXT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [{"contentDetails": {"videoId": "c"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client.playlist_items_page("PL123", Some("NEXT")).await.unwrap();
    assert_eq!(page.video_ids, vec!["c"]);
    assert!(page.next_page_token.is_none());
}

#[tokio::test]
async fn video_durations_joins_ids() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .and(query_param("id", "a,b"))
        .and(query_param("part", "contentDetails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "items": [
                {"id": "a", "contentDetails": {"duration": "PT1M30S"}},
                {"id": "b", "contentDetails": {"duration": "PT2M"}}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids = vec!["a".to_string(), "b".to_string()];
    let durations = client.video_durations(&ids).await.unwrap();
    assert_eq!(durations.len(), 2);
    assert_eq!(durations[0].duration, "PT1M30S");
    assert_eq!(durations[1].video_id, "b");
}

#[tokio::test]
async fn oversized_batch_is_rejected_locally() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ids: Vec<String> = (0..51).map(|i| format!("v{i}")).collect();
    let err = client.video_durations(&ids).await.unwrap_err();
    assert!(matches!(err, YoutubeError::BatchTooLarge(51)));
}

#[tokio::test]
async fn error_status_maps_to_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/playlistItems"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "code": 404,
                "message": "The playlist identified with the request's playlistId parameter cannot be found.",
                "errors": [{"reason": "playlistNotFound"}]
            }
        })))
        .mount(&server)
        .await;

    let err = client.playlist_items_page("missing", None).await.unwrap_err();
    match err {
        YoutubeError::Api { status, reason, .. } => {
            assert_eq!(status, 404);
            assert_eq!(reason.as_deref(), Some("playlistNotFound"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_json_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/youtube/v3/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client.video_durations(&["a".to_string()]).await.unwrap_err();
    assert!(matches!(err, YoutubeError::JsonError(_)));
}
