//! Federated role template validation
//!
//! A template is checked once against the operator's own account: the custom
//! policy is created and deleted again, and every managed policy name must
//! exist in the provider's catalog. The verdict is final.

use crate::error::Result;
use crate::finalizer::{self, FinalizerStep};
use crate::model::{
    FederatedRole, FederatedRoleConditionType, FederatedRoleSpec, FederatedRoleState,
    ResourceKey,
};
use crate::policy::PolicyDocument;
use crate::reconcile::Outcome;
use crate::store::ResourceStore;
use accountflow_cloud::{ClientBuilder, IamApi, PolicyScope, codes, paginate};
use accountflow_config::OperatorConfig;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;

pub const REASON_NO_POLICIES: &str = "NoAWSCustomPolicyOrAWSManagedPolicies";
pub const REASON_INVALID_CUSTOM_POLICY: &str = "InvalidCustomerPolicy";
pub const REASON_INVALID_MANAGED_POLICY: &str = "InvalidManagedPolicy";
pub const REASON_ALL_POLICIES_VALID: &str = "AllPoliciesValid";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid { reason: &'static str, message: String },
}

/// Check a template against the provider.
///
/// Provider errors other than a malformed policy document are returned as
/// `Err` so the pass is retried; they say nothing about the template.
pub async fn validate_template<C: IamApi + ?Sized>(
    client: &C,
    spec: &FederatedRoleSpec,
) -> Result<Verdict> {
    let custom = spec.custom_policy();
    if custom.is_none() && spec.managed_policies.is_empty() {
        return Ok(Verdict::Invalid {
            reason: REASON_NO_POLICIES,
            message: "Role has no custom policy and no managed policies".to_string(),
        });
    }

    if let Some(custom) = custom {
        let document = PolicyDocument::from_statements(&custom.statements).to_json()?;
        let mut created = client
            .create_policy(&custom.name, &custom.description, &document)
            .await;
        if matches!(&created, Err(e) if e.is_already_exists()) {
            // left over from a validation pass that stopped before its cleanup
            tracing::info!("Removing leftover trial policy {}", custom.name);
            delete_local_policy(client, &custom.name).await?;
            created = client
                .create_policy(&custom.name, &custom.description, &document)
                .await;
        }
        match created {
            Ok(created) => {
                client.delete_policy(&created.arn).await?;
            }
            Err(e) if e.is_code(codes::MALFORMED_POLICY_DOCUMENT) => {
                return Ok(Verdict::Invalid {
                    reason: REASON_INVALID_CUSTOM_POLICY,
                    message: format!("Custom policy {} is invalid: {}", custom.name, e),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    if !spec.managed_policies.is_empty() {
        let catalog: HashSet<String> = paginate(|marker| async move {
            client.list_policies(PolicyScope::Aws, marker.as_deref()).await
        })
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

        if let Some(missing) = spec
            .managed_policies
            .iter()
            .find(|name| !catalog.contains(name.as_str()))
        {
            return Ok(Verdict::Invalid {
                reason: REASON_INVALID_MANAGED_POLICY,
                message: format!("Managed policy {} does not exist", missing),
            });
        }
    }

    Ok(Verdict::Valid)
}

async fn delete_local_policy<C: IamApi + ?Sized>(client: &C, name: &str) -> Result<()> {
    let local = paginate(|marker| async move {
        client.list_policies(PolicyScope::Local, marker.as_deref()).await
    })
    .await?;
    if let Some(policy) = local.into_iter().find(|p| p.name == name) {
        client.delete_policy(&policy.arn).await?;
    }
    Ok(())
}

pub struct FederatedRoleReconciler {
    store: Arc<dyn ResourceStore<FederatedRole>>,
    clients: Arc<dyn ClientBuilder>,
}

impl FederatedRoleReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore<FederatedRole>>,
        clients: Arc<dyn ClientBuilder>,
    ) -> Self {
        Self { store, clients }
    }

    pub async fn reconcile(&self, key: &ResourceKey, config: &OperatorConfig) -> Result<Outcome> {
        if config.fedramp {
            tracing::info!("FedRAMP mode, not validating federated role {}", key);
            return Ok(Outcome::Done);
        }

        let Some(role) = self.store.get(key).await? else {
            return Ok(Outcome::Done);
        };

        match finalizer::next_step(&role) {
            FinalizerStep::AddMarker => {
                finalizer::add_marker(self.store.as_ref(), &role).await?;
                return Ok(Outcome::Done);
            }
            FinalizerStep::Teardown => {
                // a template owns no provider objects
                finalizer::remove_marker(self.store.as_ref(), &role).await?;
                return Ok(Outcome::Done);
            }
            FinalizerStep::Released => return Ok(Outcome::Done),
            FinalizerStep::Proceed => {}
        }

        if role.status.state.is_terminal() {
            return Ok(Outcome::Done);
        }

        let client = self.clients.operator_client(config.default_region()).await?;
        let verdict = validate_template(client.as_ref(), &role.spec).await?;

        let mut role = role;
        let now = Utc::now();
        match verdict {
            Verdict::Valid => {
                tracing::info!("Federated role {} is valid", key);
                role.status.state = FederatedRoleState::Valid;
                role.set_condition(
                    FederatedRoleConditionType::Valid,
                    REASON_ALL_POLICIES_VALID,
                    "All policies are valid",
                    now,
                );
            }
            Verdict::Invalid { reason, message } => {
                tracing::warn!("Federated role {} is invalid: {}", key, message);
                role.status.state = FederatedRoleState::Invalid;
                role.set_condition(FederatedRoleConditionType::Invalid, reason, &message, now);
            }
        }
        self.store.update_status(&role).await?;
        Ok(Outcome::Done)
    }
}
