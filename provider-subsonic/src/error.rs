//! Error types for Subsonic provider

use core_library::ServiceError;
use thiserror::Error;

/// Subsonic error codes that mean the credentials are bad
const AUTH_ERROR_CODES: [u32; 3] = [40, 41, 44];

/// Subsonic provider errors
#[derive(Error, Debug)]
pub enum SubsonicError {
    /// Server rejected the credentials (HTTP 401 or an auth error code)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server answered with `status: "failed"`
    #[error("Subsonic API error {code}: {message}")]
    ApiError { code: u32, message: String },

    /// Non-2xx HTTP status
    #[error("Unexpected HTTP status {status} from {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Server URL or credentials are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Transport failure
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

impl SubsonicError {
    /// Classify a `status: "failed"` payload
    pub fn from_api(code: u32, message: impl Into<String>) -> Self {
        let message = message.into();
        if AUTH_ERROR_CODES.contains(&code) {
            SubsonicError::AuthenticationFailed(message)
        } else {
            SubsonicError::ApiError { code, message }
        }
    }
}

/// Result type for Subsonic operations
pub type Result<T> = std::result::Result<T, SubsonicError>;

impl From<SubsonicError> for ServiceError {
    fn from(error: SubsonicError) -> Self {
        match error {
            SubsonicError::AuthenticationFailed(msg) => ServiceError::Unauthorized(msg),
            SubsonicError::HttpStatus { status: 401, endpoint } => {
                ServiceError::Unauthorized(format!("HTTP 401 from {}", endpoint))
            }
            SubsonicError::BridgeError(err) => err.into(),
            other => ServiceError::Generic(other.to_string()),
        }
    }
}
