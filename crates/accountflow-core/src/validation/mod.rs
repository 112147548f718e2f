//! Validation of ready pool accounts: OU placement and owner tag

pub mod ou;
pub mod reconciler;
pub mod tags;

pub use ou::{MAX_OU_DEPTH, MoveOutcome, is_in_target_ou, move_if_needed};
pub use reconciler::{AccountValidationReconciler, MOVE_RETRY_INTERVAL};
pub use tags::{TagOutcome, validate_owner_tag};

use accountflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The account is not one validation applies to
    #[error("account is not eligible for validation: {0}")]
    InvalidAccount(String),

    #[error("account has no AWS account id")]
    MissingAwsAccount,

    #[error("{id} has {count} parents, expected exactly one")]
    MultipleParents { id: String, count: usize },

    #[error("no parent found for account {0}")]
    NoParent(String),

    #[error("organization tree above {account_id} is deeper than {depth} levels")]
    HierarchyTooDeep { account_id: String, depth: usize },

    #[error("failed to move account: {0}")]
    AccountMoveFailed(CloudError),

    #[error("account has no owner tag")]
    MissingOwnerTag,

    #[error("account owner tag is '{found}', expected '{expected}'")]
    IncorrectOwnerTag { found: String, expected: String },

    #[error("failed to tag account: {0}")]
    AccountTagFailed(CloudError),

    #[error(transparent)]
    Provider(#[from] CloudError),
}
