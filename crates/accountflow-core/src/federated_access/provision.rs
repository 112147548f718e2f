//! Create-or-replace of the role and policy behind an access request

use super::naming;
use crate::error::Result;
use crate::model::FederatedRoleSpec;
use crate::policy::PolicyDocument;
use accountflow_cloud::{CloudError, IamApi, Partition, PolicySummary, RoleSummary, paginate};

/// Where the request's objects live
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub account_id: &'a str,
    pub uid: &'a str,
    pub partition: Partition,
}

/// An attachment failed after `attached` had already succeeded
#[derive(Debug, Clone, PartialEq)]
pub struct AttachFailure {
    pub attached: Vec<String>,
    pub policy_arn: String,
    pub source: CloudError,
}

async fn detach_ignoring_missing<C: IamApi + ?Sized>(
    client: &C,
    role_name: &str,
    policy_arn: &str,
) -> accountflow_cloud::Result<()> {
    match client.detach_role_policy(role_name, policy_arn).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Detach every policy currently attached to `role_name`
pub async fn detach_all<C: IamApi + ?Sized>(
    client: &C,
    role_name: &str,
) -> accountflow_cloud::Result<Vec<PolicySummary>> {
    let attached = paginate(|marker| async move {
        client
            .list_attached_role_policies(role_name, marker.as_deref())
            .await
    })
    .await?;
    for policy in &attached {
        detach_ignoring_missing(client, role_name, &policy.arn).await?;
    }
    Ok(attached)
}

/// Create `<customPolicyName>-<uid>`, replacing a leftover of the same name.
pub async fn ensure_custom_policy<C: IamApi + ?Sized>(
    client: &C,
    template: &FederatedRoleSpec,
    role_name: &str,
    target: Target<'_>,
) -> Result<Option<PolicySummary>> {
    let Some(custom) = template.custom_policy() else {
        return Ok(None);
    };
    let name = naming::policy_name(&custom.name, target.uid);
    let document = PolicyDocument::from_statements(&custom.statements).to_json()?;

    match client
        .create_policy(&name, &custom.description, &document)
        .await
    {
        Ok(policy) => Ok(Some(policy)),
        Err(e) if e.is_already_exists() => {
            tracing::info!("Policy {} already exists, replacing it", name);
            let arn = target.partition.local_policy_arn(target.account_id, &name);
            // a leftover can only be attached to our own role
            detach_ignoring_missing(client, role_name, &arn).await?;
            client.delete_policy(&arn).await?;
            let policy = client
                .create_policy(&name, &custom.description, &document)
                .await?;
            Ok(Some(policy))
        }
        Err(e) => Err(e.into()),
    }
}

/// Create `<templateName>-<uid>` trusting exactly `principal_arn`,
/// replacing a leftover of the same name.
pub async fn ensure_role<C: IamApi + ?Sized>(
    client: &C,
    role_name: &str,
    description: &str,
    principal_arn: &str,
) -> Result<RoleSummary> {
    let trust = PolicyDocument::trust(principal_arn).to_json()?;

    match client.create_role(role_name, description, &trust).await {
        Ok(role) => Ok(role),
        Err(e) if e.is_already_exists() => {
            tracing::info!("Role {} already exists, replacing it", role_name);
            detach_all(client, role_name).await?;
            client.delete_role(role_name).await?;
            Ok(client.create_role(role_name, description, &trust).await?)
        }
        Err(e) => Err(e.into()),
    }
}

/// ARNs to attach: managed policies first, then the custom policy
pub fn policy_arns(template: &FederatedRoleSpec, target: Target<'_>) -> Vec<String> {
    let mut arns: Vec<String> = template
        .managed_policies
        .iter()
        .map(|name| target.partition.managed_policy_arn(name))
        .collect();
    if let Some(custom) = template.custom_policy() {
        let name = naming::policy_name(&custom.name, target.uid);
        arns.push(target.partition.local_policy_arn(target.account_id, &name));
    }
    arns
}

/// Attach each policy with its own call, stopping at the first failure.
pub async fn attach_policies<C: IamApi + ?Sized>(
    client: &C,
    role_name: &str,
    arns: &[String],
) -> std::result::Result<(), AttachFailure> {
    let mut attached = Vec::new();
    for arn in arns {
        if let Err(source) = client.attach_role_policy(role_name, arn).await {
            return Err(AttachFailure {
                attached,
                policy_arn: arn.clone(),
                source,
            });
        }
        attached.push(arn.clone());
    }
    Ok(())
}

/// Undo a partial attachment. Failures are logged; teardown sweeps
/// whatever is left.
pub async fn detach_policies<C: IamApi + ?Sized>(client: &C, role_name: &str, arns: &[String]) {
    for arn in arns {
        if let Err(e) = detach_ignoring_missing(client, role_name, arn).await {
            tracing::warn!("Failed to detach {} from {}: {}", arn, role_name, e);
        }
    }
}
