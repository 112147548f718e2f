//! Resource model
//!
//! Every reconciled kind is `metadata` + `spec` + `status`. Anything a
//! reconciler has to remember between passes lives in `status` or in the
//! metadata labels.

pub mod account;
pub mod condition;
pub mod federated_access;
pub mod federated_role;
pub mod meta;

pub use account::*;
pub use condition::*;
pub use federated_access::*;
pub use federated_role::*;
pub use meta::*;
