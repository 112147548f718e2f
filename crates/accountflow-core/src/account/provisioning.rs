//! Account creation driver

use accountflow_cloud::{
    CloudError, CreateAccountState, CreateAccountStatus, FAILURE_REASON_ACCOUNT_LIMIT_EXCEEDED,
    OrganizationsApi, Tag, codes,
};
use std::time::Duration;
use thiserror::Error;

/// Tag key identifying the shard that owns an account
pub const OWNER_TAG: &str = "owner";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountCreationError {
    #[error("AWS account limit exceeded")]
    AccountLimitExceeded,

    #[error("AWS internal server error while creating account")]
    InternalFailure,

    #[error("too many requests to AWS while creating account")]
    TooManyRequests,

    #[error("failed to create AWS account: {0}")]
    FailedCreateAccount(String),

    /// The status check itself failed
    #[error("{0}")]
    Provider(CloudError),
}

impl AccountCreationError {
    /// Delay before the next attempt for outcomes that are requeued rather
    /// than surfaced. Throttling is surfaced and has none.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AccountCreationError::AccountLimitExceeded => Some(Duration::from_secs(10 * 60)),
            _ => None,
        }
    }
}

/// Map a failed create call onto the creation outcome
pub fn classify_create_error(err: &CloudError) -> AccountCreationError {
    if err.is_throttled() {
        return AccountCreationError::TooManyRequests;
    }
    match err.code() {
        Some(codes::CONSTRAINT_VIOLATION) => AccountCreationError::AccountLimitExceeded,
        Some(codes::SERVICE_EXCEPTION) => AccountCreationError::InternalFailure,
        _ => AccountCreationError::FailedCreateAccount(err.to_string()),
    }
}

/// Request a new account and check on it once.
///
/// The returned status is either `SUCCEEDED` (with the account id) or
/// `IN_PROGRESS`; in the latter case the request id is the handle for
/// [`check_create_status`] on a later pass.
pub async fn create_account<C: OrganizationsApi + ?Sized>(
    client: &C,
    name: &str,
    email: &str,
) -> Result<CreateAccountStatus, AccountCreationError> {
    let created = client.create_account(name, email).await.map_err(|e| {
        tracing::error!("CreateAccount failed for {}: {}", name, e);
        classify_create_error(&e)
    })?;
    tracing::info!(
        "Account creation requested for {} (request {})",
        name,
        created.request_id
    );
    check_create_status(client, &created.request_id).await
}

/// Look up an outstanding creation request.
pub async fn check_create_status<C: OrganizationsApi + ?Sized>(
    client: &C,
    request_id: &str,
) -> Result<CreateAccountStatus, AccountCreationError> {
    let status = client
        .describe_create_account_status(request_id)
        .await
        .map_err(AccountCreationError::Provider)?;

    match status.state {
        CreateAccountState::Failed => {
            let reason = status.failure_reason.clone().unwrap_or_default();
            tracing::warn!("Account creation request {} failed: {}", request_id, reason);
            if reason == FAILURE_REASON_ACCOUNT_LIMIT_EXCEEDED {
                Err(AccountCreationError::AccountLimitExceeded)
            } else {
                Err(AccountCreationError::FailedCreateAccount(reason))
            }
        }
        CreateAccountState::InProgress | CreateAccountState::Succeeded => Ok(status),
    }
}

/// Set the `owner` tag on an account, replacing any previous value
pub async fn tag_account<C: OrganizationsApi + ?Sized>(
    client: &C,
    account_id: &str,
    owner: &str,
) -> accountflow_cloud::Result<()> {
    tracing::info!("Tagging account {} with {}={}", account_id, OWNER_TAG, owner);
    client
        .tag_resource(account_id, &[Tag::new(OWNER_TAG, owner)])
        .await
}
