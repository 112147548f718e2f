//! Request/response types shared by all provider backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// State reported by `DescribeCreateAccountStatus`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateAccountState {
    InProgress,
    Succeeded,
    Failed,
}

impl CreateAccountState {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(Self::InProgress),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CreateAccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreateAccountState::InProgress => write!(f, "IN_PROGRESS"),
            CreateAccountState::Succeeded => write!(f, "SUCCEEDED"),
            CreateAccountState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Failure reason reported when the organization is out of account capacity
pub const FAILURE_REASON_ACCOUNT_LIMIT_EXCEEDED: &str = "ACCOUNT_LIMIT_EXCEEDED";

/// Status of an account creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccountStatus {
    /// Request handle used for `DescribeCreateAccountStatus`
    pub request_id: String,

    pub state: CreateAccountState,

    pub failure_reason: Option<String>,

    /// Assigned once the request succeeded
    pub account_id: Option<String>,
}

impl CreateAccountStatus {
    pub fn in_progress(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: CreateAccountState::InProgress,
            failure_reason: None,
            account_id: None,
        }
    }

    pub fn succeeded(request_id: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: CreateAccountState::Succeeded,
            failure_reason: None,
            account_id: Some(account_id.into()),
        }
    }

    pub fn failed(request_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            state: CreateAccountState::Failed,
            failure_reason: Some(reason.into()),
            account_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentKind {
    Root,
    OrganizationalUnit,
}

/// A parent node of an account or OU in the organization tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub id: String,
    pub kind: ParentKind,
}

/// Scope filter for `ListPolicies`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PolicyScope {
    #[default]
    All,
    /// AWS managed policies only
    Aws,
    /// Customer managed policies in the calling account
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySummary {
    pub name: String,
    pub arn: String,
}

impl PolicySummary {
    pub fn new(name: impl Into<String>, arn: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: arn.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSummary {
    pub name: String,
    pub arn: String,
}

/// One page of a marker-paginated listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Marker for the next request; `None` once the listing is exhausted
    pub next_marker: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_marker: None,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.next_marker.is_some()
    }
}

/// Temporary credentials returned by `AssumeRole`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"** redacted **")
            .field("session_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: String,
    pub arn: Option<String>,
    pub user_id: Option<String>,
}

/// Reference to a credential secret held by the resource store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub name: String,
    pub namespace: String,
}

impl SecretRef {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl std::fmt::Display for SecretRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
