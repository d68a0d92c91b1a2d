//! Runtime configuration.
//!
//! Everything is resolved once at startup from environment variables (after
//! `.env` has been loaded). Unset or blank variables fall back to defaults;
//! present but unparseable values fail startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::{Error, Result};

/// Playlist tracked when `PLAYLIST_ID` is not set.
pub const DEFAULT_PLAYLIST_ID: &str = "PLEFWxoBc4reTSR7_7lEXQKKjDFZc6xmH8";

/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:playlist_data.db?mode=rwc";

/// `DATABASE_URL` value that selects the in-process snapshot store.
pub const MEMORY_DATABASE_URL: &str = "memory";

/// Locations checked by the credential resolver, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialPaths {
    /// Token provisioned by the hosting environment.
    pub host_token: PathBuf,
    /// Token written by a previous consent flow.
    pub local_token: PathBuf,
    /// OAuth client secret used to run the consent flow.
    pub client_secret: PathBuf,
}

impl Default for CredentialPaths {
    fn default() -> Self {
        Self {
            host_token: PathBuf::from("/etc/secrets/token.json"),
            local_token: PathBuf::from("token.json"),
            client_secret: PathBuf::from("client_secret.json"),
        }
    }
}

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub playlist_id: String,
    /// Zone whose calendar date keys snapshots and whose midnight wakes the scheduler.
    pub timezone: Tz,
    pub credentials: CredentialPaths,
    /// Pause after persisting a freshly consented token.
    pub consent_settle_delay: Duration,
    /// Upper bound on waiting for the browser consent redirect.
    pub consent_timeout: Duration,
    /// Run the background daily loop. When disabled only request-initiated ticks run.
    pub scheduler_enabled: bool,
    pub database_url: String,
    pub youtube_api_base: String,
    pub http_timeout: Duration,
    pub log_dir: String,
    /// Lines kept for `GET /logs`.
    pub log_buffer_lines: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            playlist_id: DEFAULT_PLAYLIST_ID.to_string(),
            timezone: chrono_tz::America::Sao_Paulo,
            credentials: CredentialPaths::default(),
            consent_settle_delay: Duration::from_secs(3),
            consent_timeout: Duration::from_secs(300),
            scheduler_enabled: true,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            youtube_api_base: youtube_data::YoutubeClient::BASE_URL.to_string(),
            http_timeout: Duration::from_secs(30),
            log_dir: "logs".to_string(),
            log_buffer_lines: 500,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();

        if let Some(playlist_id) = get("PLAYLIST_ID") {
            config.playlist_id = playlist_id;
        }

        if let Some(tz) = get("TRACKER_TIMEZONE") {
            config.timezone = tz
                .parse::<Tz>()
                .map_err(|_| Error::config(format!("TRACKER_TIMEZONE: unknown time zone '{tz}'")))?;
        }

        if let Some(path) = get("HOST_TOKEN_PATH") {
            config.credentials.host_token = PathBuf::from(path);
        }
        if let Some(path) = get("LOCAL_TOKEN_PATH") {
            config.credentials.local_token = PathBuf::from(path);
        }
        if let Some(path) = get("CLIENT_SECRET_PATH") {
            config.credentials.client_secret = PathBuf::from(path);
        }

        if let Some(secs) = parse_var::<u64>(&get, "CONSENT_SETTLE_DELAY_SECS")? {
            config.consent_settle_delay = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "CONSENT_TIMEOUT_SECS")? {
            config.consent_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = get("SCHEDULER_ENABLED") {
            config.scheduler_enabled = parse_bool(&value)
                .ok_or_else(|| Error::config(format!("SCHEDULER_ENABLED: expected a boolean, got '{value}'")))?;
        }

        if let Some(url) = get("DATABASE_URL") {
            config.database_url = url;
        }
        if let Some(base) = get("YOUTUBE_API_BASE") {
            url::Url::parse(&base)
                .map_err(|e| Error::config(format!("YOUTUBE_API_BASE: {e}")))?;
            config.youtube_api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_var::<u64>(&get, "HTTP_TIMEOUT_SECS")? {
            config.http_timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = get("LOG_DIR") {
            config.log_dir = dir;
        }
        if let Some(lines) = parse_var::<usize>(&get, "LOG_BUFFER_LINES")? {
            config.log_buffer_lines = lines.max(1);
        }

        Ok(config)
    }

    /// Whether snapshots live in the in-process store instead of SQLite.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.eq_ignore_ascii_case(MEMORY_DATABASE_URL)
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::config(format!("{key}: {e} (got '{raw}')"))),
        None => Ok(None),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
