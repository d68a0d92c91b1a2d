//! Credential source resolver.
//!
//! Decides which credential file to use and turns it into a token.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::CredentialPaths;

use super::consent::ConsentFlow;
use super::error::CredentialError;
use super::token::StoredToken;
use super::types::{CredentialSource, ResolvedCredential};

/// Resolves usable credentials from the configured files.
///
/// Checks in order: host token → local token → client secret.
/// The first file that exists wins; its content is not validated here.
pub struct CredentialResolver {
    paths: CredentialPaths,
    consent: Arc<dyn ConsentFlow>,
    settle_delay: Duration,
    /// Serializes detection → consent → persist so no resolver reads a half-finished flow.
    lock: Mutex<()>,
}

impl CredentialResolver {
    /// Create a new credential resolver.
    pub fn new(paths: CredentialPaths, consent: Arc<dyn ConsentFlow>, settle_delay: Duration) -> Self {
        Self {
            paths,
            consent,
            settle_delay,
            lock: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &CredentialPaths {
        &self.paths
    }

    /// Find which credential source is available, by file existence only.
    pub fn detect_source(&self) -> CredentialSource {
        if self.paths.host_token.exists() {
            debug!(path = %self.paths.host_token.display(), "Found host token");
            return CredentialSource::HostToken(self.paths.host_token.clone());
        }

        if self.paths.local_token.exists() {
            debug!(path = %self.paths.local_token.display(), "Found local token");
            return CredentialSource::LocalToken(self.paths.local_token.clone());
        }

        if self.paths.client_secret.exists() {
            debug!(path = %self.paths.client_secret.display(), "Found client secret");
            return CredentialSource::ClientSecret(self.paths.client_secret.clone());
        }

        debug!("No credential source found");
        CredentialSource::NotFound
    }

    /// Produce a token from the highest-priority available source.
    ///
    /// With only a client secret present this runs the consent flow, saves
    /// the token to the local token path and waits the settle delay. With no
    /// source present nothing is written.
    #[instrument(skip(self))]
    pub async fn resolve(&self) -> Result<ResolvedCredential, CredentialError> {
        let _guard = self.lock.lock().await;

        let source = self.detect_source();
        let token = match &source {
            CredentialSource::HostToken(path) | CredentialSource::LocalToken(path) => {
                StoredToken::load(path).await?
            }
            CredentialSource::ClientSecret(path) => {
                info!(client_secret = %path.display(), "No token found, starting consent flow");
                let token = self.consent.obtain_token(path).await?;

                token.persist(&self.paths.local_token).await?;
                info!(path = %self.paths.local_token.display(), "Saved new token");

                if !self.settle_delay.is_zero() {
                    tokio::time::sleep(self.settle_delay).await;
                }
                token
            }
            CredentialSource::NotFound => {
                warn!(
                    host_token = %self.paths.host_token.display(),
                    local_token = %self.paths.local_token.display(),
                    client_secret = %self.paths.client_secret.display(),
                    "No credential source available"
                );
                return Err(CredentialError::NoCredentialSource);
            }
        };

        info!(source = %source, "Credentials resolved");
        Ok(ResolvedCredential { source, token })
    }
}
