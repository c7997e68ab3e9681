//! Error types for remote stack service operations.

use thiserror::Error;

/// Result type alias for remote operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur when talking to the remote services.
#[derive(Error, Debug)]
pub enum CloudError {
    /// An error reported by the service itself.
    #[error("{message}")]
    Service { code: String, message: String },

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("AWS CLI not available: {0}")]
    CliNotAvailable(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification of a remote failure, used by the retry policy and the
/// create/update/delete decision logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Throttled,
    AlreadyExists,
    NoUpdates,
    NotFound,
    Other,
}

impl ErrorKind {
    /// Classify a service error from its code, falling back to the message.
    ///
    /// The service reports "no updates" and "does not exist" only as a
    /// generic `ValidationError`, so those two are matched on message text.
    pub fn classify(code: &str, message: &str) -> Self {
        match code {
            "Throttling" | "ThrottlingException" | "RequestLimitExceeded" => {
                return ErrorKind::Throttled
            }
            "AlreadyExistsException" => return ErrorKind::AlreadyExists,
            _ => {}
        }

        if message.contains("No updates are to be performed") {
            ErrorKind::NoUpdates
        } else if message.contains("already exists") {
            ErrorKind::AlreadyExists
        } else if message.contains("does not exist") {
            ErrorKind::NotFound
        } else {
            ErrorKind::Other
        }
    }
}

impl CloudError {
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CloudError::Service { code, message } => ErrorKind::classify(code, message),
            CloudError::ResourceNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_throttling(&self) -> bool {
        self.kind() == ErrorKind::Throttled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(ErrorKind::classify("Throttling", "Rate exceeded"), ErrorKind::Throttled);
        assert_eq!(
            ErrorKind::classify("RequestLimitExceeded", "Request limit exceeded."),
            ErrorKind::Throttled
        );
        assert_eq!(
            ErrorKind::classify("AlreadyExistsException", "Stack [web] already exists"),
            ErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_classify_validation_messages() {
        assert_eq!(
            ErrorKind::classify("ValidationError", "No updates are to be performed."),
            ErrorKind::NoUpdates
        );
        assert_eq!(
            ErrorKind::classify("ValidationError", "Stack with id web does not exist"),
            ErrorKind::NotFound
        );
        assert_eq!(
            ErrorKind::classify("ValidationError", "Template format error"),
            ErrorKind::Other
        );
    }

    #[test]
    fn test_service_error_displays_message() {
        let err = CloudError::service("ValidationError", "No updates are to be performed.");
        assert_eq!(err.to_string(), "No updates are to be performed.");
        assert!(!err.is_throttling());
    }
}
