//! Backend API errors.

use thiserror::Error;

/// Errors that can occur when talking to the DineSphere backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the body could not be read
    /// (DNS, connect, timeout).
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success HTTP status.
    #[error("backend returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The backend answered but reported failure in its envelope.
    #[error("{message}")]
    Rejected {
        /// Message from the envelope, or a per-endpoint default.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("unexpected backend response: {0}")]
    Parse(String),

    /// An endpoint URL could not be built.
    #[error("invalid backend url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    /// Whether retrying later could succeed.
    ///
    /// Transport failures and 5xx responses are transient; an envelope
    /// rejection or a malformed body will fail the same way again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Rejected { .. } | Self::Parse(_) | Self::Url(_) => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
