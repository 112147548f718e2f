//! Federated account access: provisioning and teardown of the per-request
//! role and custom policy inside a target account.

pub mod naming;
pub mod provision;
pub mod reconciler;
pub mod teardown;

pub use reconciler::FederatedAccessReconciler;
pub use teardown::{PolicyMatcher, TeardownOutcome, cleanup, teardown};
