//! AccountFlow core
//!
//! Reconciliation logic for pooled cloud accounts and the federated access
//! granted against them.
//!
//! ```text
//!  ResourceStore ──snapshot──▶ Reconciler ──▶ evaluator (pure predicates)
//!        ▲                        │
//!        │                        ├──▶ account::provisioning ──┐
//!        │                        ├──▶ validation::{ou, tags} ─┤
//!        │                        ├──▶ federated_role ─────────┼──▶ accountflow_cloud
//!        │                        └──▶ federated_access ───────┘
//!        └──── update / update_status ◀─┘
//! ```
//!
//! A pass is stateless: everything it must remember is written back to the
//! resource's status or labels before it returns. The dispatcher that calls
//! `reconcile` guarantees at most one pass per resource at a time.

pub mod account;
pub mod error;
pub mod evaluator;
pub mod federated_access;
pub mod federated_role;
pub mod finalizer;
pub mod model;
pub mod policy;
pub mod reconcile;
pub mod store;
pub mod validation;

pub use account::{AccountCreationError, AccountReconciler};
pub use error::{CoreError, Result};
pub use federated_access::FederatedAccessReconciler;
pub use federated_role::FederatedRoleReconciler;
pub use finalizer::FINALIZER;
pub use model::*;
pub use reconcile::Outcome;
pub use store::{MemoryStore, Resource, ResourceStore};
pub use validation::{AccountValidationReconciler, ValidationError};
