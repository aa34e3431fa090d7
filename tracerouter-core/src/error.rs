use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("unable to obtain credentials: {0}")]
    Auth(String),
    #[error("compute api error: {0}")]
    Api(#[from] ApiError),
    #[error("invalid match pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport failure: {0}")]
    Transport(#[from] hyper::Error),
    #[error("invalid request uri: {0}")]
    Uri(#[from] http::Error),
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: http::StatusCode,
        body: String,
    },
    #[error("no response from {url} after {after:?}")]
    Timeout {
        url: String,
        after: std::time::Duration,
    },
    #[error("unable to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Whether a later attempt of the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout { .. } => true,
            ApiError::Status { status, .. } => {
                status.is_server_error() || *status == http::StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::Uri(_) | ApiError::Decode { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
