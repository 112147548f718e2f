//! Federated role template

use super::condition::{Condition, ConditionStatus, find_condition, set_condition};
use super::meta::ObjectMeta;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{ operator: { key: value } }`, e.g. `{"StringEquals": {"aws:RequestedRegion": "us-east-1"}}`
pub type StatementCondition = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementEffect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSpec {
    #[serde(rename = "AWS")]
    pub aws: Vec<String>,
}

/// One statement of a template's custom policy, as written by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementSpec {
    pub effect: StatementEffect,

    #[serde(default)]
    pub action: Vec<String>,

    #[serde(default)]
    pub resource: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<StatementCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPolicySpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub statements: Vec<StatementSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRoleSpec {
    pub role_display_name: String,

    #[serde(default)]
    pub role_description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_policy: Option<CustomPolicySpec>,

    /// Names of AWS managed policies to attach
    #[serde(default)]
    pub managed_policies: Vec<String>,
}

impl FederatedRoleSpec {
    /// The custom policy, when one with a non-empty name is defined
    pub fn custom_policy(&self) -> Option<&CustomPolicySpec> {
        self.custom_policy.as_ref().filter(|p| !p.name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederatedRoleState {
    #[default]
    Unvalidated,
    Valid,
    Invalid,
}

impl FederatedRoleState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, FederatedRoleState::Unvalidated)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederatedRoleConditionType {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRoleStatus {
    #[serde(default)]
    pub state: FederatedRoleState,

    #[serde(default)]
    pub conditions: Vec<Condition<FederatedRoleConditionType>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedRole {
    pub metadata: ObjectMeta,

    pub spec: FederatedRoleSpec,

    #[serde(default)]
    pub status: FederatedRoleStatus,
}

impl FederatedRole {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: FederatedRoleSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: FederatedRoleStatus::default(),
        }
    }

    pub fn condition(
        &self,
        condition_type: FederatedRoleConditionType,
    ) -> Option<&Condition<FederatedRoleConditionType>> {
        find_condition(&self.status.conditions, condition_type)
    }

    pub fn set_condition(
        &mut self,
        condition_type: FederatedRoleConditionType,
        reason: &str,
        message: &str,
        now: DateTime<Utc>,
    ) {
        set_condition(
            &mut self.status.conditions,
            condition_type,
            ConditionStatus::True,
            reason,
            message,
            now,
        );
    }
}
