use thiserror::Error;

#[derive(Debug, Error)]
pub enum YoutubeError {
    #[error("http error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("api error {status}: {message}")]
    Api {
        status: u16,
        reason: Option<String>,
        message: String,
    },
    #[error("authorization error: {0}")]
    Auth(String),
    #[error("invalid ISO-8601 duration: {0:?}")]
    InvalidDuration(String),
    #[error("batch of {0} ids exceeds the per-request limit")]
    BatchTooLarge(usize),
}

impl YoutubeError {
    /// Quota and rate limit rejections are reported as 403 with a reason code.
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            Self::Api { reason: Some(reason), .. }
                if reason == "quotaExceeded" || reason == "rateLimitExceeded"
        )
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. })
    }
}
