//! Cloud provider error types

use thiserror::Error;

/// Error codes returned by the AWS Organizations / IAM / STS APIs that the
/// reconcilers branch on.
pub mod codes {
    pub const ENTITY_ALREADY_EXISTS: &str = "EntityAlreadyExists";
    pub const NO_SUCH_ENTITY: &str = "NoSuchEntity";
    pub const MALFORMED_POLICY_DOCUMENT: &str = "MalformedPolicyDocument";
    pub const CONSTRAINT_VIOLATION: &str = "ConstraintViolationException";
    pub const SERVICE_EXCEPTION: &str = "ServiceException";
    pub const TOO_MANY_REQUESTS: &str = "TooManyRequestsException";
    pub const DUPLICATE_ACCOUNT: &str = "DuplicateAccountException";
    pub const ACCESS_DENIED: &str = "AccessDenied";
}

/// Cloud provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    /// An error reported by the provider API, carrying its error code
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    #[error("Unexpected response from provider: {0}")]
    UnexpectedResponse(String),

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl CloudError {
    pub fn api(code: impl Into<String>, message: impl Into<String>) -> Self {
        CloudError::Api {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Provider error code, if this error came from the provider API
    pub fn code(&self) -> Option<&str> {
        match self {
            CloudError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    pub fn is_already_exists(&self) -> bool {
        self.is_code(codes::ENTITY_ALREADY_EXISTS)
    }

    pub fn is_not_found(&self) -> bool {
        self.is_code(codes::NO_SUCH_ENTITY)
    }

    pub fn is_throttled(&self) -> bool {
        matches!(
            self.code(),
            Some(codes::TOO_MANY_REQUESTS) | Some("Throttling") | Some("ThrottlingException")
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
