use thiserror::Error;

/// Errors surfaced by the Tidepool clients.
///
/// Every variant carries a human readable message and, when the failure came
/// from an HTTP reply, the status code the service answered with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TidepoolError {
    /// Bad caller input, or the service answered 400 / 413.
    #[error("{message}")]
    Validation {
        message: String,
        status_code: Option<u16>,
    },

    /// The service answered 404.
    #[error("{message}")]
    NotFound {
        message: String,
        status_code: Option<u16>,
    },

    /// The service answered 503. The only retryable kind.
    #[error("{message}")]
    ServiceUnavailable {
        message: String,
        status_code: Option<u16>,
    },

    /// Any other failure: unmapped status, malformed body, exhausted retries.
    #[error("{message}")]
    Service {
        message: String,
        status_code: Option<u16>,
    },
}

pub type TidepoolResult<T> = Result<T, TidepoolError>;

impl TidepoolError {
    pub fn validation(message: impl Into<String>) -> Self {
        TidepoolError::Validation {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn service(message: impl Into<String>) -> Self {
        TidepoolError::Service {
            message: message.into(),
            status_code: None,
        }
    }

    /// Classify an HTTP error status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let status_code = Some(status);
        match status {
            400 | 413 => TidepoolError::Validation {
                message,
                status_code,
            },
            404 => TidepoolError::NotFound {
                message,
                status_code,
            },
            503 => TidepoolError::ServiceUnavailable {
                message,
                status_code,
            },
            _ => TidepoolError::Service {
                message,
                status_code,
            },
        }
    }

    pub fn message(&self) -> &str {
        match self {
            TidepoolError::Validation { message, .. }
            | TidepoolError::NotFound { message, .. }
            | TidepoolError::ServiceUnavailable { message, .. }
            | TidepoolError::Service { message, .. } => message,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            TidepoolError::Validation { status_code, .. }
            | TidepoolError::NotFound { status_code, .. }
            | TidepoolError::ServiceUnavailable { status_code, .. }
            | TidepoolError::Service { status_code, .. } => *status_code,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, TidepoolError::ServiceUnavailable { .. })
    }
}

impl From<serde_json::Error> for TidepoolError {
    fn from(err: serde_json::Error) -> Self {
        TidepoolError::service(format!("JSON error: {}", err))
    }
}

/// Failure below the HTTP layer: connect, TLS, timeout, or a released executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError(err.to_string())
    }
}
