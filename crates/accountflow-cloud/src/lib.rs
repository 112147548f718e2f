//! AccountFlow Cloud Provider Abstraction
//!
//! This crate defines the provider-facing surface the AccountFlow
//! reconcilers are written against: the AWS Organizations, IAM and STS
//! operations they consume, the request/response types those operations
//! exchange, and the error model (provider error codes) the reconcilers
//! branch on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                accountflow-core                  │
//! │   account / validation / federated reconcilers   │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │               accountflow-cloud                  │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait OrganizationsApi / IamApi / StsApi │   │
//! │  │  trait ClientBuilder                      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  ARN helpers │  │  FakeCloud   │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼───────────┐
//! │ accountflow-cloud │
//! │       -aws        │
//! └───────────────────┘
//! ```

pub mod arn;
pub mod error;
pub mod provider;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use arn::Partition;
pub use error::{CloudError, Result, codes};
pub use provider::{ClientBuilder, CloudClient, IamApi, OrganizationsApi, StsApi, paginate};
pub use types::{
    CallerIdentity, CreateAccountState, CreateAccountStatus, FAILURE_REASON_ACCOUNT_LIMIT_EXCEEDED,
    Page, Parent, ParentKind, PolicyScope, PolicySummary, RoleSummary, SecretRef,
    SessionCredentials, Tag,
};
