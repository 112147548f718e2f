use super::naming;
use super::provision::{self, Target};
use super::teardown;
use crate::error::Result;
use crate::finalizer::{self, FinalizerStep};
use crate::model::{
    ACCOUNT_ID_LABEL, FederatedAccess, FederatedRole, FederatedRoleState, ResourceKey, UID_LABEL,
};
use crate::reconcile::Outcome;
use crate::store::ResourceStore;
use accountflow_cloud::{ClientBuilder, StsApi};
use accountflow_config::OperatorConfig;
use chrono::Utc;
use std::sync::Arc;

pub const REASON_ROLE_NOT_FOUND: &str = "RoleNotFound";
pub const REASON_ROLE_INVALID: &str = "RoleInvalid";
pub const REASON_IDENTITY_FAILED: &str = "AccountIdentityFailed";
pub const REASON_POLICY_FAILED: &str = "PolicyCreationFailed";
pub const REASON_ROLE_FAILED: &str = "RoleCreationFailed";
pub const REASON_ATTACH_FAILED: &str = "PolicyAttachmentFailed";

/// Grants an external principal access to an account by instantiating a
/// federated role template there.
pub struct FederatedAccessReconciler {
    store: Arc<dyn ResourceStore<FederatedAccess>>,
    templates: Arc<dyn ResourceStore<FederatedRole>>,
    clients: Arc<dyn ClientBuilder>,
}

impl FederatedAccessReconciler {
    pub fn new(
        store: Arc<dyn ResourceStore<FederatedAccess>>,
        templates: Arc<dyn ResourceStore<FederatedRole>>,
        clients: Arc<dyn ClientBuilder>,
    ) -> Self {
        Self {
            store,
            templates,
            clients,
        }
    }

    pub async fn reconcile(&self, key: &ResourceKey, config: &OperatorConfig) -> Result<Outcome> {
        let Some(access) = self.store.get(key).await? else {
            return Ok(Outcome::Done);
        };
        match finalizer::next_step(&access) {
            FinalizerStep::AddMarker => {
                finalizer::add_marker(self.store.as_ref(), &access).await?;
                return Ok(Outcome::Done);
            }
            FinalizerStep::Teardown => {
                let template = self.templates.get(&access.spec.federated_role).await?;
                let outcome = teardown::teardown(
                    self.clients.as_ref(),
                    &access,
                    template.as_ref(),
                    config.partition(),
                    config.default_region(),
                )
                .await?;
                tracing::debug!("Teardown of {}: {:?}", key, outcome);
                finalizer::remove_marker(self.store.as_ref(), &access).await?;
                return Ok(Outcome::Done);
            }
            FinalizerStep::Released => return Ok(Outcome::Done),
            FinalizerStep::Proceed => {}
        }

        if access.is_terminal() {
            return Ok(Outcome::Done);
        }

        let mut access = access;
        let Some(template) = self.templates.get(&access.spec.federated_role).await? else {
            tracing::warn!(
                "{}: federated role {} does not exist",
                key,
                access.spec.federated_role
            );
            access.mark_failed(REASON_ROLE_NOT_FOUND, "Requested role does not exist", Utc::now());
            self.store.update_status(&access).await?;
            return Ok(Outcome::Done);
        };
        if template.status.state == FederatedRoleState::Invalid {
            access.mark_failed(REASON_ROLE_INVALID, "Requested role is invalid", Utc::now());
            self.store.update_status(&access).await?;
            return Ok(Outcome::Done);
        }

        self.provision(access, &template, config).await
    }

    async fn provision(
        &self,
        mut access: FederatedAccess,
        template: &FederatedRole,
        config: &OperatorConfig,
    ) -> Result<Outcome> {
        let key = access.metadata.key();
        let region = config.default_region();

        if !access.metadata.has_label(UID_LABEL) {
            access.metadata.set_label(UID_LABEL, naming::generate_uid());
            access = self.store.update(&access).await?;
        }
        let uid = access.uid().unwrap_or_default().to_string();

        let client = self
            .clients
            .client_from_secret(&access.spec.credential_secret, region)
            .await?;

        let identity = match client.get_caller_identity().await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::error!("{}: failed to get account identity: {}", key, e);
                access.mark_failed(
                    REASON_IDENTITY_FAILED,
                    "Failed to get account ID information",
                    Utc::now(),
                );
                self.store.update_status(&access).await?;
                return Err(e.into());
            }
        };
        if access.account_id() != Some(identity.account.as_str()) {
            access.metadata.set_label(ACCOUNT_ID_LABEL, identity.account.as_str());
            access = self.store.update(&access).await?;
        }

        let target = Target {
            account_id: &identity.account,
            uid: &uid,
            partition: config.partition(),
        };
        let role_name = naming::role_name(&access.spec.federated_role.name, &uid);

        let policy =
            provision::ensure_custom_policy(client.as_ref(), &template.spec, &role_name, target)
                .await;
        if let Err(e) = policy {
            tracing::error!("{}: failed to create custom policy: {}", key, e);
            access.mark_failed(REASON_POLICY_FAILED, "Failed to create custom policy", Utc::now());
            self.store.update_status(&access).await?;
            return Ok(Outcome::Done);
        }

        if let Err(e) = provision::ensure_role(
            client.as_ref(),
            &role_name,
            &template.spec.role_description,
            &access.spec.external_principal_arn,
        )
        .await
        {
            tracing::error!("{}: failed to create role {}: {}", key, role_name, e);
            access.mark_failed(REASON_ROLE_FAILED, "Failed to create role", Utc::now());
            self.store.update_status(&access).await?;
            return Ok(Outcome::Done);
        }

        let arns = provision::policy_arns(&template.spec, target);
        if let Err(failure) = provision::attach_policies(client.as_ref(), &role_name, &arns).await {
            tracing::error!(
                "{}: failed to attach {} to {}: {}",
                key,
                failure.policy_arn,
                role_name,
                failure.source
            );
            provision::detach_policies(client.as_ref(), &role_name, &failure.attached).await;
            access.mark_failed(
                REASON_ATTACH_FAILED,
                "Failed to attach policies to role",
                Utc::now(),
            );
            self.store.update_status(&access).await?;
            return Ok(Outcome::Done);
        }

        let console_url = target.partition.switch_role_url(&identity.account, &role_name);
        tracing::info!("{}: role {} ready in account {}", key, role_name, identity.account);
        access.mark_ready(console_url, Utc::now());
        self.store.update_status(&access).await?;
        Ok(Outcome::Done)
    }
}
