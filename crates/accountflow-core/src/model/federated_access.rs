//! Federated account access request

use super::condition::{Condition, ConditionStatus, find_condition, set_condition};
use super::meta::{ObjectMeta, ResourceKey};
use accountflow_cloud::SecretRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short token suffixed to every provider object created for a request
pub const UID_LABEL: &str = "uid";

/// Account id discovered through the request's credentials
pub const ACCOUNT_ID_LABEL: &str = "awsAccountID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedAccessSpec {
    /// Template to instantiate
    pub federated_role: ResourceKey,

    /// Credentials for the target account
    pub credential_secret: SecretRef,

    /// Principal allowed to assume the provisioned role
    #[serde(rename = "externalCustomerAWSIAMARN")]
    pub external_principal_arn: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederatedAccessState {
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FederatedAccessConditionType {
    Ready,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedAccessStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<FederatedAccessState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_url: Option<String>,

    #[serde(default)]
    pub conditions: Vec<Condition<FederatedAccessConditionType>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederatedAccess {
    pub metadata: ObjectMeta,

    pub spec: FederatedAccessSpec,

    #[serde(default)]
    pub status: FederatedAccessStatus,
}

impl FederatedAccess {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        spec: FederatedAccessSpec,
    ) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: FederatedAccessStatus::default(),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.metadata.label(UID_LABEL)
    }

    pub fn account_id(&self) -> Option<&str> {
        self.metadata.label(ACCOUNT_ID_LABEL)
    }

    pub fn is_ready(&self) -> bool {
        self.status.state == Some(FederatedAccessState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.state.is_some()
    }

    pub fn condition(
        &self,
        condition_type: FederatedAccessConditionType,
    ) -> Option<&Condition<FederatedAccessConditionType>> {
        find_condition(&self.status.conditions, condition_type)
    }

    pub fn mark_failed(&mut self, reason: &str, message: &str, now: DateTime<Utc>) {
        self.status.state = Some(FederatedAccessState::Failed);
        set_condition(
            &mut self.status.conditions,
            FederatedAccessConditionType::Failed,
            ConditionStatus::True,
            reason,
            message,
            now,
        );
    }

    pub fn mark_ready(&mut self, console_url: String, now: DateTime<Utc>) {
        self.status.state = Some(FederatedAccessState::Ready);
        self.status.console_url = Some(console_url);
        set_condition(
            &mut self.status.conditions,
            FederatedAccessConditionType::Ready,
            ConditionStatus::True,
            "Ready",
            "Account Access Ready",
            now,
        );
    }
}
