//! ARN construction for the commercial and GovCloud partitions

use serde::{Deserialize, Serialize};

pub const RESOURCE_TYPE_ROLE: &str = "role";
pub const RESOURCE_TYPE_POLICY: &str = "policy";

pub const US_EAST_1: &str = "us-east-1";
pub const US_GOV_EAST_1: &str = "us-gov-east-1";

/// AWS partition the operator runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    #[default]
    Aws,
    AwsUsGov,
}

impl Partition {
    pub fn from_fedramp(fedramp: bool) -> Self {
        if fedramp {
            Partition::AwsUsGov
        } else {
            Partition::Aws
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Aws => "aws",
            Partition::AwsUsGov => "aws-us-gov",
        }
    }

    pub fn default_region(&self) -> &'static str {
        match self {
            Partition::Aws => US_EAST_1,
            Partition::AwsUsGov => US_GOV_EAST_1,
        }
    }

    /// `arn:<partition>:iam::<account>:<type>/<id>`
    pub fn iam_arn(&self, account_id: &str, resource_type: &str, resource_id: &str) -> String {
        format!(
            "arn:{}:iam::{}:{}/{}",
            self.as_str(),
            account_id,
            resource_type,
            resource_id
        )
    }

    pub fn role_arn(&self, account_id: &str, role_name: &str) -> String {
        self.iam_arn(account_id, RESOURCE_TYPE_ROLE, role_name)
    }

    /// ARN of a customer managed policy in `account_id`
    pub fn local_policy_arn(&self, account_id: &str, policy_name: &str) -> String {
        self.iam_arn(account_id, RESOURCE_TYPE_POLICY, policy_name)
    }

    /// ARN of an AWS managed policy
    pub fn managed_policy_arn(&self, policy_name: &str) -> String {
        format!("arn:{}:iam::aws:policy/{}", self.as_str(), policy_name)
    }

    /// Console deep-link that switches into `role_name` in `account_id`
    pub fn switch_role_url(&self, account_id: &str, role_name: &str) -> String {
        let host = match self {
            Partition::Aws => "signin.aws.amazon.com",
            Partition::AwsUsGov => "signin.amazonaws-us-gov.com",
        };
        format!(
            "https://{}/switchrole?account={}&roleName={}",
            host, account_id, role_name
        )
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
