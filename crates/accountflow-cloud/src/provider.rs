//! Cloud provider trait definitions

use crate::error::Result;
use crate::types::{
    CallerIdentity, CreateAccountStatus, Page, Parent, PolicyScope, PolicySummary, RoleSummary,
    SecretRef, SessionCredentials, Tag,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Account-management API (AWS Organizations)
#[async_trait]
pub trait OrganizationsApi: Send + Sync {
    /// Submit an account creation request; the returned status is usually
    /// `IN_PROGRESS` and carries the request id.
    async fn create_account(&self, name: &str, email: &str) -> Result<CreateAccountStatus>;

    async fn describe_create_account_status(&self, request_id: &str)
    -> Result<CreateAccountStatus>;

    async fn tag_resource(&self, resource_id: &str, tags: &[Tag]) -> Result<()>;

    async fn untag_resource(&self, resource_id: &str, keys: &[String]) -> Result<()>;

    async fn list_tags_for_resource(&self, resource_id: &str) -> Result<Vec<Tag>>;

    async fn list_parents(&self, child_id: &str) -> Result<Vec<Parent>>;

    async fn move_account(
        &self,
        account_id: &str,
        source_parent_id: &str,
        destination_parent_id: &str,
    ) -> Result<()>;
}

/// Identity and role API (AWS IAM)
#[async_trait]
pub trait IamApi: Send + Sync {
    async fn create_policy(
        &self,
        name: &str,
        description: &str,
        document: &str,
    ) -> Result<PolicySummary>;

    async fn delete_policy(&self, policy_arn: &str) -> Result<()>;

    async fn list_policies(
        &self,
        scope: PolicyScope,
        marker: Option<&str>,
    ) -> Result<Page<PolicySummary>>;

    async fn create_role(
        &self,
        name: &str,
        description: &str,
        trust_policy: &str,
    ) -> Result<RoleSummary>;

    async fn delete_role(&self, name: &str) -> Result<()>;

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<()>;

    async fn list_attached_role_policies(
        &self,
        role_name: &str,
        marker: Option<&str>,
    ) -> Result<Page<PolicySummary>>;
}

/// Security token API (AWS STS)
#[async_trait]
pub trait StsApi: Send + Sync {
    async fn assume_role(&self, role_arn: &str, session_name: &str)
    -> Result<SessionCredentials>;

    async fn get_caller_identity(&self) -> Result<CallerIdentity>;
}

/// A client bound to one set of credentials, exposing every API the
/// reconcilers consume.
pub trait CloudClient: OrganizationsApi + IamApi + StsApi {}

impl<T: OrganizationsApi + IamApi + StsApi> CloudClient for T {}

/// Builds clients for the three credential sources the reconcilers use.
#[async_trait]
pub trait ClientBuilder: Send + Sync {
    /// Client using the operator's own credentials
    async fn operator_client(&self, region: &str) -> Result<Arc<dyn CloudClient>>;

    /// Client using the credentials stored in `secret`
    async fn client_from_secret(
        &self,
        secret: &SecretRef,
        region: &str,
    ) -> Result<Arc<dyn CloudClient>>;

    /// Client using temporary credentials from an assumed role
    async fn client_from_session(
        &self,
        credentials: &SessionCredentials,
        region: &str,
    ) -> Result<Arc<dyn CloudClient>>;
}

/// Drain a marker-paginated listing into a single vector.
///
/// Runs to exhaustion within the caller's pass; a provider error on any page
/// aborts the whole listing.
pub async fn paginate<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut marker: Option<String> = None;
    loop {
        let page = fetch(marker.take()).await?;
        items.extend(page.items);
        match page.next_marker {
            Some(next) => marker = Some(next),
            None => break,
        }
    }
    Ok(items)
}
