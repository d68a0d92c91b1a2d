//! Interactive OAuth consent for installed applications.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::error::CredentialError;
use super::token::{GOOGLE_TOKEN_URI, StoredToken, request_token};

/// Read-only access to the user's YouTube account.
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

const SUCCESS_PAGE: &str =
    "<html><body><h1>Authorization complete</h1><p>You may close this window.</p></body></html>";
const FAILURE_PAGE: &str =
    "<html><body><h1>Authorization failed</h1><p>Check the tracker logs.</p></body></html>";
const WAITING_PAGE: &str =
    "<html><body><h1>Waiting for authorization</h1></body></html>";

/// Obtains a token from a user when only an OAuth client secret is available.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConsentFlow: Send + Sync {
    /// Run the flow using the client secret file at `client_secret`.
    async fn obtain_token(&self, client_secret: &Path) -> Result<StoredToken, CredentialError>;
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

/// OAuth client registration from a Google client secret file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Google wraps the registration in `installed` (desktop) or `web`.
#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub async fn load(path: &Path) -> Result<Self, CredentialError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CredentialError::io(path, e))?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, CredentialError> {
        let file: ClientSecretFile =
            serde_json::from_str(raw).map_err(|e| CredentialError::invalid_file(path, e))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| CredentialError::invalid_file(path, "no 'installed' or 'web' section"))
    }

    /// Consent page URL requesting offline access for `scopes`.
    pub fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        scopes: &[String],
    ) -> Result<Url, CredentialError> {
        let scope = scopes.join(" ");
        Url::parse_with_params(
            &self.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("scope", scope.as_str()),
                ("state", state),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| CredentialError::Consent(format!("invalid auth_uri '{}': {e}", self.auth_uri)))
    }
}

/// Loopback-redirect consent flow: the user opens the logged URL in a browser
/// and Google redirects back to a short-lived local listener.
pub struct InstalledAppFlow {
    http: reqwest::Client,
    scopes: Vec<String>,
    timeout: Duration,
}

impl InstalledAppFlow {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            http,
            scopes: vec![YOUTUBE_READONLY_SCOPE.to_string()],
            timeout,
        }
    }

    /// Serve the redirect on `listener` until a code arrives or the timeout passes.
    async fn wait_for_code(
        &self,
        listener: TcpListener,
        expected_state: String,
    ) -> Result<String, CredentialError> {
        let (tx, rx) = oneshot::channel();
        let state = CallbackState {
            expected_state: Arc::from(expected_state),
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(state);

        let shutdown = CancellationToken::new();
        let server = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                axum::serve(listener, app)
                    .with_graceful_shutdown(async move { shutdown.cancelled().await })
                    .await
            }
        });

        let outcome = tokio::time::timeout(self.timeout, rx).await;

        shutdown.cancel();
        match tokio::time::timeout(Duration::from_secs(5), server).await {
            Ok(Ok(Err(e))) => warn!(error = %e, "Consent callback server error"),
            Ok(Err(e)) => warn!(error = %e, "Consent callback server panicked"),
            Err(_) => debug!("Consent callback server still draining, detaching"),
            Ok(Ok(Ok(()))) => {}
        }

        match outcome {
            Err(_) => Err(CredentialError::ConsentTimeout),
            Ok(Err(_)) => Err(CredentialError::Consent("callback server stopped".into())),
            Ok(Ok(result)) => result,
        }
    }

    async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        redirect_uri: &str,
    ) -> Result<StoredToken, CredentialError> {
        let response = request_token(
            &self.http,
            &secrets.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &secrets.client_id),
                ("client_secret", &secrets.client_secret),
                ("redirect_uri", redirect_uri),
            ],
        )
        .await
        .map_err(|e| match e {
            CredentialError::RefreshFailed(reason) => {
                CredentialError::Consent(format!("code exchange rejected: {reason}"))
            }
            other => other,
        })?;

        let mut token = StoredToken {
            token: None,
            refresh_token: None,
            token_uri: secrets.token_uri.clone(),
            client_id: Some(secrets.client_id.clone()),
            client_secret: Some(secrets.client_secret.clone()),
            scopes: self.scopes.clone(),
            expiry: None,
        };
        token.apply_response(response, Utc::now());
        Ok(token)
    }
}

#[async_trait]
impl ConsentFlow for InstalledAppFlow {
    async fn obtain_token(&self, client_secret: &Path) -> Result<StoredToken, CredentialError> {
        let secrets = ClientSecrets::load(client_secret).await?;

        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)))
            .await
            .map_err(|e| CredentialError::Consent(format!("failed to bind loopback listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| CredentialError::Consent(e.to_string()))?
            .port();

        let redirect_uri = format!("http://127.0.0.1:{port}/");
        let state = uuid::Uuid::new_v4().simple().to_string();
        let url = secrets.authorization_url(&redirect_uri, &state, &self.scopes)?;

        info!(
            timeout_secs = self.timeout.as_secs(),
            "Open this URL in a browser to authorize read-only YouTube access: {}", url
        );

        let code = self.wait_for_code(listener, state).await?;
        let token = self.exchange_code(&secrets, &code, &redirect_uri).await?;
        info!("Consent granted");
        Ok(token)
    }
}

#[derive(Clone)]
struct CallbackState {
    expected_state: Arc<str>,
    tx: Arc<Mutex<Option<oneshot::Sender<Result<String, CredentialError>>>>>,
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let outcome = match (params.error, params.code) {
        (Some(error), _) => Err(CredentialError::Consent(format!("authorization denied: {error}"))),
        (None, Some(_)) if params.state.as_deref() != Some(&*state.expected_state) => {
            Err(CredentialError::Consent("state mismatch in redirect".into()))
        }
        (None, Some(code)) => Ok(code),
        // Stray hit with neither a code nor an error; keep waiting.
        (None, None) => return Html(WAITING_PAGE),
    };

    let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
    if let Some(tx) = state.tx.lock().take() {
        let _ = tx.send(outcome);
    }
    Html(page)
}
