//! AWS backend for AccountFlow
//!
//! Implements the `accountflow-cloud` provider traits on top of the AWS SDK
//! for Organizations, IAM and STS.
//!
//! # Credential sources
//!
//! - operator: the default AWS credential chain (environment, profile,
//!   instance role)
//! - secret: long-lived access keys resolved through a [`CredentialSource`]
//! - session: temporary credentials returned by `AssumeRole`
//!
//! # Example
//!
//! ```ignore
//! use accountflow_cloud::ClientBuilder;
//! use accountflow_cloud_aws::{AwsClientBuilder, StaticCredentials};
//! use std::sync::Arc;
//!
//! let builder = AwsClientBuilder::new(Arc::new(StaticCredentials::new()));
//! let client = builder.operator_client("us-east-1").await?;
//! let identity = client.get_caller_identity().await?;
//! ```

pub mod builder;
pub mod client;
mod error;

pub use builder::{AccessKeys, AwsClientBuilder, CredentialSource, StaticCredentials};
pub use client::AwsClient;
