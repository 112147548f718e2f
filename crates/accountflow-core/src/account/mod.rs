//! Account lifecycle: creation driver and reconciler

pub mod provisioning;
pub mod reconciler;

pub use provisioning::{
    AccountCreationError, OWNER_TAG, check_create_status, classify_create_error, create_account,
    tag_account,
};
pub use reconciler::AccountReconciler;
