use crate::account::AccountCreationError;
use crate::validation::ValidationError;
use accountflow_cloud::CloudError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Cloud API error: {0}")]
    Cloud(#[from] CloudError),

    #[error(transparent)]
    AccountCreation(#[from] AccountCreationError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("Policy document error: {0}")]
    PolicyDocument(#[from] serde_json::Error),

    #[error("{resource} is Ready but is missing the '{label}' label")]
    MissingLabel {
        resource: String,
        label: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
