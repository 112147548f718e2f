//! Mapping of AWS SDK errors onto `CloudError`

use accountflow_cloud::CloudError;
use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

/// Convert a failed SDK call. Service errors keep their AWS error code so the
/// reconcilers can branch on it; everything else is classified by where the
/// request broke down.
pub(crate) fn from_sdk<E, R>(operation: &str, err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            CloudError::Transport(format!("{}: {}", operation, DisplayErrorContext(&err)))
        }
        SdkError::ConstructionFailure(_) => {
            CloudError::InvalidRequest(format!("{}: {}", operation, DisplayErrorContext(&err)))
        }
        _ => from_metadata(operation, &err),
    }
}

/// `Api { code, message }` when the error carries an AWS error code
pub(crate) fn from_metadata(operation: &str, err: &impl ProvideErrorMetadata) -> CloudError {
    match err.code() {
        Some(code) => CloudError::api(code, err.message().unwrap_or_default()),
        None => CloudError::UnexpectedResponse(format!(
            "{} failed without an error code: {}",
            operation,
            err.message().unwrap_or("no message")
        )),
    }
}

/// A response that parsed but lacks a field the API documents as present
pub(crate) fn missing_field(operation: &str, field: &str) -> CloudError {
    CloudError::UnexpectedResponse(format!("{} response has no {}", operation, field))
}
