use reqwest::StatusCode;

/// Failures at the card backend boundary.
///
/// These describe what went wrong on the wire. The client-facing taxonomy
/// (validation / network / not found / unknown) is derived from them in
/// `card-store`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid response JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("card not found: {0}")]
    NotFound(String),

    #[error("backend returned error: status={status} detail={detail}")]
    Backend { status: StatusCode, detail: String },

    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("failed to read context file {path}: {source}")]
    ContextFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ApiError {
    /// Whether the failure is transient and an idempotent request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            ApiError::Backend { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            ApiError::InvalidJson(_)
            | ApiError::NotFound(_)
            | ApiError::InvalidUrl(_)
            | ApiError::ContextFile { .. } => false,
        }
    }
}
