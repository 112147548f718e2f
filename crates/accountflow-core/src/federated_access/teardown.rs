//! Removal of the role and policies created for an access request

use super::naming;
use super::provision;
use crate::error::{CoreError, Result};
use crate::evaluator::ORGANIZATION_ACCESS_ROLE;
use crate::model::{ACCOUNT_ID_LABEL, FederatedAccess, FederatedRole, UID_LABEL};
use accountflow_cloud::{
    ClientBuilder, CloudClient, IamApi, Partition, PolicyScope, StsApi, paginate,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// The request never got far enough to create anything
    NothingToDo,
    Cleaned {
        deleted_policies: Vec<String>,
        role_deleted: bool,
    },
}

/// Which customer managed policies belong to the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyMatcher {
    /// `<customPolicyName>-<uid>`
    Exact(String),
    /// Any policy ending in `-<uid>`, used when the template is gone. Only
    /// applied to policies attached to the request's role.
    UidSuffix(String),
}

impl PolicyMatcher {
    pub fn new(custom_policy_name: Option<&str>, uid: &str) -> Self {
        match custom_policy_name {
            Some(name) => PolicyMatcher::Exact(naming::policy_name(name, uid)),
            None => PolicyMatcher::UidSuffix(format!("-{}", uid)),
        }
    }

    pub fn matches(&self, policy_name: &str) -> bool {
        match self {
            PolicyMatcher::Exact(name) => policy_name == name,
            PolicyMatcher::UidSuffix(suffix) => policy_name.ends_with(suffix.as_str()),
        }
    }

    /// Whether unattached account-local policies may be matched too
    pub fn sweeps_local_policies(&self) -> bool {
        matches!(self, PolicyMatcher::Exact(_))
    }
}

async fn delete_policy_ignoring_missing<C: IamApi + ?Sized>(
    client: &C,
    arn: &str,
) -> accountflow_cloud::Result<()> {
    match client.delete_policy(arn).await {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Remove the role and every policy of the request from the account `client`
/// is bound to. Safe to run any number of times.
///
/// Attached policies are detached (and deleted when they match) first; if
/// the role is already gone this step is skipped. With an exact matcher the
/// account-local policies are swept as well, so a policy left behind by a
/// half-finished provisioning pass is found too. A suffix matcher never
/// touches unattached policies.
pub async fn cleanup<C: IamApi + ?Sized>(
    client: &C,
    role_name: &str,
    matcher: &PolicyMatcher,
) -> Result<TeardownOutcome> {
    let mut deleted_policies = Vec::new();

    let role_exists = match provision::detach_all(client, role_name).await {
        Ok(detached) => {
            for policy in detached.iter().filter(|p| matcher.matches(&p.name)) {
                delete_policy_ignoring_missing(client, &policy.arn).await?;
                deleted_policies.push(policy.name.clone());
            }
            true
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!("Role {} does not exist", role_name);
            false
        }
        Err(e) => return Err(e.into()),
    };

    if matcher.sweeps_local_policies() {
        let local = paginate(|marker| async move {
            client.list_policies(PolicyScope::Local, marker.as_deref()).await
        })
        .await?;
        let leftovers: Vec<_> = local
            .into_iter()
            .filter(|p| matcher.matches(&p.name) && !deleted_policies.contains(&p.name))
            .collect();
        for policy in leftovers {
            delete_policy_ignoring_missing(client, &policy.arn).await?;
            deleted_policies.push(policy.name);
        }
    }

    let role_deleted = if role_exists {
        match client.delete_role(role_name).await {
            Ok(()) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(e.into()),
        }
    } else {
        false
    };

    for name in &deleted_policies {
        tracing::info!("Deleted policy {}", name);
    }
    if role_deleted {
        tracing::info!("Deleted role {}", role_name);
    }

    Ok(TeardownOutcome::Cleaned {
        deleted_policies,
        role_deleted,
    })
}

/// Credentials inside the target account: the organization access role,
/// falling back to the BYOC admin role of the request.
async fn cleanup_session(
    clients: &dyn ClientBuilder,
    partition: Partition,
    region: &str,
    account_id: &str,
    uid: &str,
) -> Result<Arc<dyn CloudClient>> {
    let operator = clients.operator_client(region).await?;
    let primary = partition.role_arn(account_id, ORGANIZATION_ACCESS_ROLE);

    let credentials = match operator
        .assume_role(&primary, naming::CLEANUP_SESSION_NAME)
        .await
    {
        Ok(credentials) => credentials,
        Err(e) => {
            let fallback = partition.role_arn(account_id, &naming::byoc_admin_role(uid));
            tracing::warn!("Could not assume {} ({}), trying {}", primary, e, fallback);
            operator
                .assume_role(&fallback, naming::CLEANUP_SESSION_NAME)
                .await?
        }
    };

    Ok(clients.client_from_session(&credentials, region).await?)
}

/// Tear down everything provisioned for `access`.
///
/// `template` may be `None` when the template was deleted first; policies
/// attached to the role are then matched by UID suffix.
pub async fn teardown(
    clients: &dyn ClientBuilder,
    access: &FederatedAccess,
    template: Option<&FederatedRole>,
    partition: Partition,
    region: &str,
) -> Result<TeardownOutcome> {
    let key = access.metadata.key();
    let (uid, account_id) = match (access.uid(), access.account_id()) {
        (Some(uid), Some(account_id)) => (uid, account_id),
        (uid, _) => {
            if access.is_ready() {
                return Err(CoreError::MissingLabel {
                    resource: key.to_string(),
                    label: if uid.is_none() { UID_LABEL } else { ACCOUNT_ID_LABEL },
                });
            }
            tracing::info!("{} was never provisioned, nothing to clean up", key);
            return Ok(TeardownOutcome::NothingToDo);
        }
    };

    let client = cleanup_session(clients, partition, region, account_id, uid).await?;
    let role_name = naming::role_name(&access.spec.federated_role.name, uid);
    let custom_policy = template
        .and_then(|t| t.spec.custom_policy())
        .map(|p| p.name.as_str());
    let matcher = PolicyMatcher::new(custom_policy, uid);

    tracing::info!("Cleaning up role {} in account {}", role_name, account_id);
    cleanup(client.as_ref(), &role_name, &matcher).await
}
