use thiserror::Error;

/// Failure classes for calls to the music server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// The server did not answer in time; triggers offline fallback
    Timeout,
    /// Credentials were rejected
    Unauthorized,
    /// Everything else (bad status, malformed payload, connection refused)
    Generic,
}

#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request failed: {0}")]
    Generic(String),
}

impl ServiceError {
    pub fn kind(&self) -> ServiceErrorKind {
        match self {
            ServiceError::Timeout(_) => ServiceErrorKind::Timeout,
            ServiceError::Unauthorized(_) => ServiceErrorKind::Unauthorized,
            ServiceError::Generic(_) => ServiceErrorKind::Generic,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ServiceErrorKind::Timeout
    }
}

impl From<bridge_traits::BridgeError> for ServiceError {
    fn from(err: bridge_traits::BridgeError) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout(err.to_string())
        } else {
            ServiceError::Generic(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
