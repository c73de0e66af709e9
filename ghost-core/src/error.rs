use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("api response missing embedded items")]
    MissingEmbedded,
    #[error("not a directory: {0}")]
    NotADirectory(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    RateLimit,
    Transient,
    Permanent,
}

impl ProviderError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            ProviderError::Api { status, .. } => Some(classify_api_status(*status)),
            _ => None,
        }
    }

    /// Network failures and transient API statuses are worth another attempt;
    /// malformed responses and permanent statuses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Request(err) => !err.is_decode() && !err.is_builder(),
            ProviderError::Api { .. } => matches!(
                self.classification(),
                Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
            ),
            ProviderError::Url(_)
            | ProviderError::MissingEmbedded
            | ProviderError::NotADirectory(_) => false,
        }
    }
}

pub(crate) fn classify_api_status(status: StatusCode) -> ApiErrorClass {
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        ApiErrorClass::Auth
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}
