//! `CloudClient` backed by the AWS SDK

use crate::error::{from_sdk, missing_field};
use accountflow_cloud::{
    CallerIdentity, CloudError, CreateAccountState, CreateAccountStatus, IamApi,
    OrganizationsApi, Page, Parent, ParentKind, PolicyScope, PolicySummary, Result, RoleSummary,
    SessionCredentials, StsApi, Tag,
};
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_iam::types::PolicyScopeType;
use aws_sdk_organizations::types::ParentType;

/// Organizations, IAM and STS clients sharing one credential chain
#[derive(Debug, Clone)]
pub struct AwsClient {
    organizations: aws_sdk_organizations::Client,
    iam: aws_sdk_iam::Client,
    sts: aws_sdk_sts::Client,
}

impl AwsClient {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            organizations: aws_sdk_organizations::Client::new(config),
            iam: aws_sdk_iam::Client::new(config),
            sts: aws_sdk_sts::Client::new(config),
        }
    }
}

pub(crate) fn convert_status(
    status: &aws_sdk_organizations::types::CreateAccountStatus,
) -> Result<CreateAccountStatus> {
    let request_id = status
        .id()
        .ok_or_else(|| missing_field("CreateAccountStatus", "Id"))?;
    let state = status
        .state()
        .and_then(|s| CreateAccountState::parse(s.as_str()))
        .ok_or_else(|| missing_field("CreateAccountStatus", "State"))?;

    Ok(CreateAccountStatus {
        request_id: request_id.to_string(),
        state,
        failure_reason: status.failure_reason().map(|r| r.as_str().to_string()),
        account_id: status.account_id().map(str::to_string),
    })
}

pub(crate) fn convert_parent(parent: &aws_sdk_organizations::types::Parent) -> Result<Parent> {
    let id = parent.id().ok_or_else(|| missing_field("ListParents", "Id"))?;
    let kind = match parent.r#type() {
        Some(ParentType::Root) => ParentKind::Root,
        Some(ParentType::OrganizationalUnit) => ParentKind::OrganizationalUnit,
        other => {
            return Err(CloudError::UnexpectedResponse(format!(
                "parent {} has unknown type {:?}",
                id, other
            )));
        }
    };
    Ok(Parent {
        id: id.to_string(),
        kind,
    })
}

fn scope_type(scope: PolicyScope) -> PolicyScopeType {
    match scope {
        PolicyScope::All => PolicyScopeType::All,
        PolicyScope::Aws => PolicyScopeType::Aws,
        PolicyScope::Local => PolicyScopeType::Local,
    }
}

/// IAM list calls report `IsTruncated` and the marker separately
fn next_marker(is_truncated: bool, marker: Option<&str>) -> Option<String> {
    if is_truncated {
        marker.map(str::to_string)
    } else {
        None
    }
}

#[async_trait]
impl OrganizationsApi for AwsClient {
    async fn create_account(&self, name: &str, email: &str) -> Result<CreateAccountStatus> {
        let out = self
            .organizations
            .create_account()
            .account_name(name)
            .email(email)
            .send()
            .await
            .map_err(|e| from_sdk("CreateAccount", e))?;
        let status = out
            .create_account_status()
            .ok_or_else(|| missing_field("CreateAccount", "CreateAccountStatus"))?;
        convert_status(status)
    }

    async fn describe_create_account_status(
        &self,
        request_id: &str,
    ) -> Result<CreateAccountStatus> {
        let out = self
            .organizations
            .describe_create_account_status()
            .create_account_request_id(request_id)
            .send()
            .await
            .map_err(|e| from_sdk("DescribeCreateAccountStatus", e))?;
        let status = out
            .create_account_status()
            .ok_or_else(|| missing_field("DescribeCreateAccountStatus", "CreateAccountStatus"))?;
        convert_status(status)
    }

    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> Result<()> {
        let tags = tags
            .iter()
            .map(|t| {
                aws_sdk_organizations::types::Tag::builder()
                    .key(&t.key)
                    .value(&t.value)
                    .build()
                    .map_err(|e| CloudError::InvalidRequest(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        self.organizations
            .tag_resource()
            .resource_id(resource_id)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(|e| from_sdk("TagResource", e))?;
        Ok(())
    }

    async fn untag_resource(&self, resource_id: &str, keys: &[String]) -> Result<()> {
        self.organizations
            .untag_resource()
            .resource_id(resource_id)
            .set_tag_keys(Some(keys.to_vec()))
            .send()
            .await
            .map_err(|e| from_sdk("UntagResource", e))?;
        Ok(())
    }

    async fn list_tags_for_resource(&self, resource_id: &str) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .organizations
                .list_tags_for_resource()
                .resource_id(resource_id)
                .set_next_token(token.take())
                .send()
                .await
                .map_err(|e| from_sdk("ListTagsForResource", e))?;
            tags.extend(out.tags().iter().map(|t| Tag::new(t.key(), t.value())));
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(tags)
    }

    async fn list_parents(&self, child_id: &str) -> Result<Vec<Parent>> {
        let mut parents = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let out = self
                .organizations
                .list_parents()
                .child_id(child_id)
                .set_next_token(token.take())
                .send()
                .await
                .map_err(|e| from_sdk("ListParents", e))?;
            for parent in out.parents() {
                parents.push(convert_parent(parent)?);
            }
            match out.next_token() {
                Some(next) => token = Some(next.to_string()),
                None => break,
            }
        }
        Ok(parents)
    }

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> Result<()> {
        self.organizations
            .move_account()
            .account_id(account_id)
            .source_parent_id(source_parent_id)
            .destination_parent_id(destination_parent_id)
            .send()
            .await
            .map_err(|e| from_sdk("MoveAccount", e))?;
        Ok(())
    }
}

#[async_trait]
impl IamApi for AwsClient {
    async fn create_policy(
        &self,
        name: &str,
        description: &str,
        document: &str,
    ) -> Result<PolicySummary> {
        let out = self
            .iam
            .create_policy()
            .policy_name(name)
            .description(description)
            .policy_document(document)
            .send()
            .await
            .map_err(|e| from_sdk("CreatePolicy", e))?;
        let arn = out
            .policy()
            .and_then(|p| p.arn())
            .ok_or_else(|| missing_field("CreatePolicy", "Policy.Arn"))?;
        Ok(PolicySummary::new(name, arn))
    }

    async fn delete_policy(&self, policy_arn: &str) -> Result<()> {
        self.iam
            .delete_policy()
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| from_sdk("DeletePolicy", e))?;
        Ok(())
    }

    async fn list_policies(
        &self,
        scope: PolicyScope,
        marker: Option<&str>,
    ) -> Result<Page<PolicySummary>> {
        let out = self
            .iam
            .list_policies()
            .scope(scope_type(scope))
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(|e| from_sdk("ListPolicies", e))?;
        let items = out
            .policies()
            .iter()
            .filter_map(|p| match (p.policy_name(), p.arn()) {
                (Some(name), Some(arn)) => Some(PolicySummary::new(name, arn)),
                _ => None,
            })
            .collect();
        Ok(Page {
            items,
            next_marker: next_marker(out.is_truncated(), out.marker()),
        })
    }

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        trust_policy: &str,
    ) -> Result<RoleSummary> {
        let out = self
            .iam
            .create_role()
            .role_name(name)
            .description(description)
            .assume_role_policy_document(trust_policy)
            .send()
            .await
            .map_err(|e| from_sdk("CreateRole", e))?;
        let role = out
            .role()
            .ok_or_else(|| missing_field("CreateRole", "Role"))?;
        Ok(RoleSummary {
            name: role.role_name().to_string(),
            arn: role.arn().to_string(),
        })
    }

    async fn delete_role(&self, name: &str) -> Result<()> {
        self.iam
            .delete_role()
            .role_name(name)
            .send()
            .await
            .map_err(|e| from_sdk("DeleteRole", e))?;
        Ok(())
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .attach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| from_sdk("AttachRolePolicy", e))?;
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()> {
        self.iam
            .detach_role_policy()
            .role_name(role_name)
            .policy_arn(policy_arn)
            .send()
            .await
            .map_err(|e| from_sdk("DetachRolePolicy", e))?;
        Ok(())
    }

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<PolicySummary>> {
        let out = self
            .iam
            .list_attached_role_policies()
            .role_name(role_name)
            .set_marker(marker.map(str::to_string))
            .send()
            .await
            .map_err(|e| from_sdk("ListAttachedRolePolicies", e))?;
        let items = out
            .attached_policies()
            .iter()
            .filter_map(|p| match (p.policy_name(), p.policy_arn()) {
                (Some(name), Some(arn)) => Some(PolicySummary::new(name, arn)),
                _ => None,
            })
            .collect();
        Ok(Page {
            items,
            next_marker: next_marker(out.is_truncated(), out.marker()),
        })
    }
}

#[async_trait]
impl StsApi for AwsClient {
    async fn assume_role(&self, role_arn: &str, session_name: &str) -> Result<SessionCredentials> {
        let out = self
            .sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| from_sdk("AssumeRole", e))?;
        let credentials = out
            .credentials()
            .ok_or_else(|| missing_field("AssumeRole", "Credentials"))?;
        let expiration = credentials.expiration();

        Ok(SessionCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration: chrono::DateTime::from_timestamp(
                expiration.secs(),
                expiration.subsec_nanos(),
            ),
        })
    }

    async fn get_caller_identity(&self) -> Result<CallerIdentity> {
        let out = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| from_sdk("GetCallerIdentity", e))?;
        let account = out
            .account()
            .ok_or_else(|| missing_field("GetCallerIdentity", "Account"))?;
        Ok(CallerIdentity {
            account: account.to_string(),
            arn: out.arn().map(str::to_string),
            user_id: out.user_id().map(str::to_string),
        })
    }
}
