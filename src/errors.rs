//! Error types for the CAS bridge.

use thiserror::Error;

/// Result type alias for the CAS bridge.
pub type Result<T, E = CasError> = std::result::Result<T, E>;

/// Main error type for the CAS bridge.
///
/// Most failure modes in this crate deliberately do *not* surface as errors:
/// readiness checks collapse to `false`, settings lookups collapse to
/// absence, and ticket-validation failures collapse to an unauthenticated
/// outcome. `CasError` covers the remaining cases where a caller genuinely
/// needs to know what went wrong, such as user-store operations during
/// account binding.
#[derive(Error, Debug)]
pub enum CasError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Network/HTTP errors talking to the CAS server
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Malformed or unexpected CAS protocol responses
    #[error("CAS protocol error: {message}")]
    Protocol { message: String },

    /// Host user store errors during account binding
    #[error("User store error: {message}")]
    UserStore { message: String },
}

impl CasError {
    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a new user store error
    pub fn user_store(message: impl Into<String>) -> Self {
        Self::UserStore {
            message: message.into(),
        }
    }
}
