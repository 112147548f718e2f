//! Account resource

use super::condition::{Condition, ConditionStatus, find_condition, set_condition};
use super::meta::ObjectMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label carrying the IAM user id used for the BYOC support role
pub const IAM_USER_ID_LABEL: &str = "iamUserId";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    Creating,
    PendingVerification,
    Pending,
    Ready,
    Failed,
}

impl std::fmt::Display for AccountState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountState::Creating => "Creating",
            AccountState::PendingVerification => "PendingVerification",
            AccountState::Pending => "Pending",
            AccountState::Ready => "Ready",
            AccountState::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountConditionType {
    Creating,
    PendingVerification,
    Pending,
    Ready,
    Failed,
    Claimed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_account_id: Option<String>,

    #[serde(default)]
    pub byoc: bool,

    /// Name of the claim bound to this account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_link_namespace: Option<String>,

    /// Pool the account was created for; unset for customer-supplied accounts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_pool: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AccountState>,

    #[serde(default)]
    pub claimed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_case_id: Option<String>,

    #[serde(default)]
    pub rotate_credentials: bool,

    #[serde(default)]
    pub rotate_console_credentials: bool,

    /// Outstanding account-creation request, re-checked on the next pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_request_id: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition<AccountConditionType>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: AccountSpec,

    #[serde(default)]
    pub status: AccountStatus,
}

impl Account {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec: AccountSpec::default(),
            status: AccountStatus::default(),
        }
    }

    pub fn condition(
        &self,
        condition_type: AccountConditionType,
    ) -> Option<&Condition<AccountConditionType>> {
        find_condition(&self.status.conditions, condition_type)
    }

    pub fn set_condition(
        &mut self,
        condition_type: AccountConditionType,
        status: ConditionStatus,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) {
        set_condition(
            &mut self.status.conditions,
            condition_type,
            status,
            reason,
            message,
            now,
        );
    }

    /// Move to `state` and record the matching condition
    pub fn transition(
        &mut self,
        state: AccountState,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) {
        self.status.state = Some(state);
        let condition_type = match state {
            AccountState::Creating => AccountConditionType::Creating,
            AccountState::PendingVerification => AccountConditionType::PendingVerification,
            AccountState::Pending => AccountConditionType::Pending,
            AccountState::Ready => AccountConditionType::Ready,
            AccountState::Failed => AccountConditionType::Failed,
        };
        self.set_condition(condition_type, ConditionStatus::True, reason, message, now);
    }
}
