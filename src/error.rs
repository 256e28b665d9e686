use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for the storage client
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the storage client
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed construction parameter
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Per-operation parameter check failed; no request was sent
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Authentication exchange failed
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Request(#[from] reqwest::Error),

    /// The service answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Requested feature is not implemented by this client
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// HTTP status of the failed call, if the service answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            Error::Request(err) => err.status(),
            _ => None,
        }
    }
}

/// Parameter validation failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("container name missed")]
    MissingContainer,

    #[error("files missed")]
    MissingFiles,

    #[error("file name missed")]
    MissingFile,
}

/// Failures of the authentication exchange
#[derive(Error, Debug)]
pub enum AuthError {
    /// The exchange failed at the transport level
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The identity endpoint refused the credentials
    #[error("rejected with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },

    /// A required response header is absent
    #[error("response header `{0}` missing")]
    MissingHeader(&'static str),

    /// A required JSON field is absent
    #[error("response field `{0}` missing")]
    MissingField(&'static str),

    /// The expiry value could not be interpreted
    #[error("invalid expiry in `{field}`: {value}")]
    InvalidExpiry { field: &'static str, value: String },

    /// The response body is not JSON
    #[error("malformed response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthError {
    /// True when the exchange succeeded but its response did not match the
    /// configured protocol variant
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            AuthError::MissingHeader(_)
                | AuthError::MissingField(_)
                | AuthError::InvalidExpiry { .. }
                | AuthError::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err: Error = ValidationError::MissingContainer.into();
        assert_eq!(err.to_string(), "Validation error: container name missed");

        let err: Error = ValidationError::MissingFiles.into();
        assert!(err.to_string().contains("files missed"));
    }

    #[test]
    fn test_auth_error_display() {
        let err: Error = AuthError::MissingHeader("x-subject-token").into();
        assert_eq!(
            err.to_string(),
            "Authentication failed: response header `x-subject-token` missing"
        );
    }

    #[test]
    fn test_auth_error_parse_category() {
        assert!(AuthError::MissingField("access.token.id").is_parse());
        assert!(!AuthError::Rejected {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        }
        .is_parse());
    }

    #[test]
    fn test_status_accessor() {
        let err = Error::Status {
            status: StatusCode::NOT_FOUND,
            body: "Not Found".to_string(),
        };
        assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
        assert_eq!(Error::NotSupported("xml".into()).status(), None);
    }
}
