//! OAuth token documents and the access-token provider.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use youtube_data::{TokenProvider, YoutubeError};

use super::error::CredentialError;

pub(crate) const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Access tokens closer than this to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// Google "authorized user" token document, as written by the Google client
/// libraries and by [`StoredToken::persist`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    /// Current access token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Expiry of `token`. Unknown expiry is treated as still valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// Read a token document from disk.
    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CredentialError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| CredentialError::invalid_file(path, e))
    }

    /// Atomically write the document to `path`.
    ///
    /// The content goes to a temporary file in the same directory, is synced,
    /// then renamed over `path`. Readers see either the old or the new file.
    pub async fn persist(&self, path: &Path) -> Result<(), CredentialError> {
        let contents = serde_json::to_vec_pretty(self)?;
        let target = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_atomic(&target, &contents))
            .await
            .map_err(|e| CredentialError::io(path, std::io::Error::other(e)))?
            .map_err(|e| CredentialError::io(path, e))
    }

    /// The access token, if it stays valid for at least `margin` after `now`.
    pub fn access_token_if_fresh(&self, now: DateTime<Utc>, margin: Duration) -> Option<&str> {
        let token = self.token.as_deref().filter(|t| !t.is_empty())?;
        match self.expiry {
            Some(expiry) if expiry - now < margin => None,
            _ => Some(token),
        }
    }

    pub(crate) fn apply_response(&mut self, response: TokenResponse, now: DateTime<Utc>) {
        self.token = Some(response.access_token);
        self.expiry = response.expires_in.map(|secs| now + Duration::seconds(secs));
        // Google only returns a refresh token on first consent.
        if let Some(refresh_token) = response.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(scope) = response.scope {
            self.scopes = scope.split_whitespace().map(String::from).collect();
        }
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Successful response of the OAuth token endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

/// POST a form to an OAuth token endpoint.
pub(crate) async fn request_token(
    http: &reqwest::Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, CredentialError> {
    let response = http.post(token_uri).form(form).send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) => match err.error_description {
                Some(description) => format!("{}: {}", err.error, description),
                None => err.error,
            },
            Err(_) => format!("HTTP {}", status.as_u16()),
        };
        return Err(CredentialError::RefreshFailed(reason));
    }

    Ok(serde_json::from_str(&body)?)
}

/// Token provider that refreshes the stored access token when it is about to expire.
///
/// Refreshed tokens live in memory only; the file on disk keeps the refresh token.
pub struct RefreshingToken {
    http: reqwest::Client,
    token: Mutex<StoredToken>,
}

impl RefreshingToken {
    pub fn new(http: reqwest::Client, token: StoredToken) -> Self {
        Self {
            http,
            token: Mutex::new(token),
        }
    }

    /// Snapshot of the current token document.
    #[cfg(test)]
    async fn current(&self) -> StoredToken {
        self.token.lock().await.clone()
    }

    async fn fresh_access_token(&self) -> Result<String, CredentialError> {
        // Held across the refresh so concurrent callers share one request.
        let mut token = self.token.lock().await;
        let now = Utc::now();

        if let Some(access) = token.access_token_if_fresh(now, Duration::seconds(EXPIRY_MARGIN_SECS)) {
            return Ok(access.to_string());
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or(CredentialError::MissingRefreshToken)?;
        let client_id = token
            .client_id
            .clone()
            .ok_or_else(|| CredentialError::RefreshFailed("token has no client_id".into()))?;
        let client_secret = token
            .client_secret
            .clone()
            .ok_or_else(|| CredentialError::RefreshFailed("token has no client_secret".into()))?;

        debug!(token_uri = %token.token_uri, "Access token missing or expiring, refreshing");
        let response = request_token(
            &self.http,
            &token.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", &refresh_token),
                ("client_id", &client_id),
                ("client_secret", &client_secret),
            ],
        )
        .await?;

        token.apply_response(response, now);
        info!(expiry = ?token.expiry, "Access token refreshed");

        token
            .token
            .clone()
            .ok_or_else(|| CredentialError::RefreshFailed("no access token returned".into()))
    }
}

#[async_trait]
impl TokenProvider for RefreshingToken {
    async fn access_token(&self) -> Result<String, YoutubeError> {
        self.fresh_access_token()
            .await
            .map_err(|e| YoutubeError::Auth(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AUTHORIZED_USER: &str = r#"{
        "token": "ya29.old",
        "refresh_token": "1//refresh",
        "token_uri": "https://oauth2.googleapis.com/token",
        "client_id": "client.apps.googleusercontent.com",
        "client_secret": "secret",
        "scopes": ["https://www.googleapis.com/auth/youtube.readonly"],
        "universe_domain": "googleapis.com",
        "account": "",
        "expiry": "2024-05-01T12:00:00.123456Z"
    }"#;

    fn http() -> reqwest::Client {
        crate::utils::http_client::install_rustls_provider();
        reqwest::Client::new()
    }

    fn token(token_uri: &str, expiry: Option<DateTime<Utc>>) -> StoredToken {
        StoredToken {
            token: Some("ya29.old".into()),
            refresh_token: Some("1//refresh".into()),
            token_uri: token_uri.into(),
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            scopes: vec![],
            expiry,
        }
    }

    #[tokio::test]
    async fn test_load_google_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, AUTHORIZED_USER).unwrap();

        let token = StoredToken::load(&path).await.unwrap();
        assert_eq!(token.token.as_deref(), Some("ya29.old"));
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(token.scopes.len(), 1);
        assert!(token.expiry.is_some());
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = StoredToken::load(&path).await.unwrap_err();
        assert!(matches!(err, CredentialError::InvalidFile { .. }));
    }

    #[tokio::test]
    async fn test_persist_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "stale").unwrap();

        let token = token(GOOGLE_TOKEN_URI, None);
        token.persist(&path).await.unwrap();

        assert_eq!(StoredToken::load(&path).await.unwrap(), token);
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_persist_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");

        token(GOOGLE_TOKEN_URI, None).persist(&path).await.unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_freshness() {
        let now = Utc::now();
        let margin = Duration::seconds(EXPIRY_MARGIN_SECS);

        assert!(token("", None).access_token_if_fresh(now, margin).is_some());
        assert!(
            token("", Some(now + Duration::hours(1)))
                .access_token_if_fresh(now, margin)
                .is_some()
        );
        assert!(
            token("", Some(now + Duration::seconds(30)))
                .access_token_if_fresh(now, margin)
                .is_none()
        );

        let mut missing = token("", None);
        missing.token = None;
        assert!(missing.access_token_if_fresh(now, margin).is_none());
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let provider = RefreshingToken::new(
            http(),
            token(&format!("{}/token", server.uri()), Some(Utc::now() + Duration::hours(1))),
        );
        assert_eq!(provider.access_token().await.unwrap(), "ya29.old");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=1%2F%2Frefresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.new",
                "expires_in": 3599,
                "scope": "https://www.googleapis.com/auth/youtube.readonly",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = RefreshingToken::new(
            http(),
            token(&format!("{}/token", server.uri()), Some(Utc::now() - Duration::minutes(5))),
        );

        assert_eq!(provider.access_token().await.unwrap(), "ya29.new");
        assert_eq!(provider.access_token().await.unwrap(), "ya29.new");

        let current = provider.current().await;
        assert_eq!(current.refresh_token.as_deref(), Some("1//refresh"));
        assert_eq!(current.scopes, vec!["https://www.googleapis.com/auth/youtube.readonly"]);
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let provider = RefreshingToken::new(
            http(),
            token(&format!("{}/token", server.uri()), Some(Utc::now() - Duration::minutes(5))),
        );

        match provider.access_token().await.unwrap_err() {
            YoutubeError::Auth(message) => assert!(message.contains("invalid_grant")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let mut stored = token(GOOGLE_TOKEN_URI, Some(Utc::now() - Duration::minutes(5)));
        stored.refresh_token = None;

        let provider = RefreshingToken::new(http(), stored);
        let err = provider.fresh_access_token().await.unwrap_err();
        assert!(matches!(err, CredentialError::MissingRefreshToken));
        assert!(err.requires_consent());
    }
}
