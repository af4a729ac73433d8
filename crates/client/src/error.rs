//! Unified error handling for the client.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::db::RepositoryError;

/// Application-level error type for client services.
#[derive(Debug, Error)]
pub enum AppError {
    /// Local store operation failed.
    #[error("Local store error: {0}")]
    Database(#[from] RepositoryError),

    /// Backend call failed.
    #[error("Backend error: {0}")]
    Api(#[from] ApiError),

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The operation needs a logged-in user.
    #[error("Not logged in")]
    NotLoggedIn,

    /// The operation needs the network and none is available.
    #[error("No network connection")]
    Offline,

    /// Invalid input from the caller.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    /// Message suitable for showing to the user.
    ///
    /// Backend rejections carry their own message; local failures are
    /// summarised without internal detail.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(ApiError::Rejected { message }) => message.clone(),
            Self::Api(ApiError::Http(_) | ApiError::Status { .. }) => {
                "Network error, please try again".to_string()
            }
            Self::Api(_) => "Unexpected response from server".to_string(),
            Self::Database(_) => "Local storage error".to_string(),
            Self::Config(e) => e.to_string(),
            Self::NotLoggedIn => "Please log in first".to_string(),
            Self::Offline => "No internet connection".to_string(),
            Self::BadRequest(msg) => msg.clone(),
        }
    }

    /// Whether the error points at a bug or broken environment rather
    /// than user input or network conditions.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Config(_) | Self::Api(ApiError::Parse(_) | ApiError::Url(_))
        )
    }
}
