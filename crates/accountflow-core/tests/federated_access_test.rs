//! Provisioning and teardown of federated access requests against the
//! in-memory cloud

use accountflow_cloud::testing::{FAKE_ACCOUNT_ID, FakeClientBuilder, FakeCloud};
use accountflow_cloud::{CloudError, SecretRef, codes};
use accountflow_config::OperatorConfig;
use accountflow_core::federated_access::reconciler::{
    REASON_ATTACH_FAILED, REASON_IDENTITY_FAILED, REASON_ROLE_INVALID, REASON_ROLE_NOT_FOUND,
};
use accountflow_core::{
    ACCOUNT_ID_LABEL, CoreError, CustomPolicySpec, FINALIZER, FederatedAccess,
    FederatedAccessConditionType, FederatedAccessReconciler, FederatedAccessSpec,
    FederatedAccessState, FederatedAccessStatus, FederatedRole, FederatedRoleSpec,
    FederatedRoleState, MemoryStore, Outcome, ResourceKey, ResourceStore, StatementEffect,
    StatementSpec, UID_LABEL,
};
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;

const NAMESPACE: &str = "aws-account-operator";
const TEMPLATE: &str = "network-mgmt";
const REQUEST: &str = "grant-network-mgmt";
const CUSTOMER_ARN: &str = "arn:aws:iam::999999999999:user/customer";

struct Harness {
    accesses: Arc<MemoryStore<FederatedAccess>>,
    templates: Arc<MemoryStore<FederatedRole>>,
    cloud: FakeCloud,
    clients: FakeClientBuilder,
    reconciler: FederatedAccessReconciler,
}

impl Harness {
    fn new(managed_policies: &[&str]) -> Self {
        let accesses = Arc::new(MemoryStore::new());
        let templates = Arc::new(MemoryStore::new());
        let cloud = FakeCloud::new();
        cloud.add_managed_policy("ReadOnlyAccess");
        let clients = FakeClientBuilder::new(cloud.clone());
        let reconciler = FederatedAccessReconciler::new(
            accesses.clone(),
            templates.clone(),
            Arc::new(clients.clone()),
        );

        templates.insert(FederatedRole::new(
            NAMESPACE,
            TEMPLATE,
            template_spec(managed_policies),
        ));
        Self {
            accesses,
            templates,
            cloud,
            clients,
            reconciler,
        }
    }

    fn request_key(&self) -> ResourceKey {
        ResourceKey::new(NAMESPACE, REQUEST)
    }

    /// Insert a request that already carries the finalizer
    fn insert_request(&self) {
        let mut access = FederatedAccess::new(NAMESPACE, REQUEST, access_spec());
        access.metadata.add_finalizer(FINALIZER);
        self.accesses.insert(access);
    }

    async fn reconcile(&self) -> accountflow_core::Result<Outcome> {
        self.reconciler
            .reconcile(&self.request_key(), &OperatorConfig::default())
            .await
    }

    fn stored(&self) -> FederatedAccess {
        self.accesses
            .peek(&self.request_key())
            .unwrap_or_else(|| panic!("{} missing from store", REQUEST))
    }

    fn uid(&self) -> String {
        self.stored().uid().unwrap_or_default().to_string()
    }
}

fn template_spec(managed_policies: &[&str]) -> FederatedRoleSpec {
    FederatedRoleSpec {
        role_display_name: "Network Management".to_string(),
        role_description: "Manage VPCs".to_string(),
        custom_policy: Some(CustomPolicySpec {
            name: "network-mgmt-policy".to_string(),
            description: "vpc access".to_string(),
            statements: vec![StatementSpec {
                effect: StatementEffect::Allow,
                action: vec!["ec2:*Vpc*".to_string()],
                resource: vec!["*".to_string()],
                condition: None,
                principal: None,
            }],
        }),
        managed_policies: managed_policies.iter().map(|s| s.to_string()).collect(),
    }
}

fn access_spec() -> FederatedAccessSpec {
    FederatedAccessSpec {
        federated_role: ResourceKey::new(NAMESPACE, TEMPLATE),
        credential_secret: SecretRef::new("byoc-credentials", NAMESPACE),
        external_principal_arn: CUSTOMER_ARN.to_string(),
    }
}

/// Template store whose reads always fail
struct UnreachableTemplates;

#[async_trait]
impl ResourceStore<FederatedRole> for UnreachableTemplates {
    async fn get(&self, _key: &ResourceKey) -> accountflow_core::Result<Option<FederatedRole>> {
        Err(CoreError::Store("connection refused".to_string()))
    }

    async fn update(&self, _role: &FederatedRole) -> accountflow_core::Result<FederatedRole> {
        Err(CoreError::Store("connection refused".to_string()))
    }

    async fn update_status(
        &self,
        _role: &FederatedRole,
    ) -> accountflow_core::Result<FederatedRole> {
        Err(CoreError::Store("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_template_store_is_not_read_outside_provisioning() {
    let accesses = Arc::new(MemoryStore::new());
    let cloud = FakeCloud::new();
    let reconciler = FederatedAccessReconciler::new(
        accesses.clone(),
        Arc::new(UnreachableTemplates),
        Arc::new(FakeClientBuilder::new(cloud.clone())),
    );
    let key = ResourceKey::new(NAMESPACE, REQUEST);
    let config = OperatorConfig::default();

    accesses.insert(FederatedAccess::new(NAMESPACE, REQUEST, access_spec()));
    assert_eq!(reconciler.reconcile(&key, &config).await.unwrap(), Outcome::Done);
    assert!(accesses.peek(&key).unwrap().metadata.has_finalizer(FINALIZER));

    let mut failed = accesses.peek(&key).unwrap();
    failed.status.state = Some(FederatedAccessState::Failed);
    accesses.insert(failed);
    assert_eq!(reconciler.reconcile(&key, &config).await.unwrap(), Outcome::Done);

    // provisioning needs the template
    let mut pending = accesses.peek(&key).unwrap();
    pending.status.state = None;
    accesses.insert(pending);
    assert!(matches!(
        reconciler.reconcile(&key, &config).await,
        Err(CoreError::Store(_))
    ));
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_first_pass_only_adds_finalizer() {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.accesses
        .insert(FederatedAccess::new(NAMESPACE, REQUEST, access_spec()));

    h.reconcile().await.unwrap();

    let stored = h.stored();
    assert!(stored.metadata.has_finalizer(FINALIZER));
    assert_eq!(stored.status, FederatedAccessStatus::default());
    assert!(h.cloud.calls().is_empty());
    assert!(h.clients.requests().is_empty());
}

#[tokio::test]
async fn test_request_is_provisioned() -> anyhow::Result<()> {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();

    assert_eq!(h.reconcile().await?, Outcome::Done);

    let stored = h.stored();
    let uid = stored
        .uid()
        .ok_or_else(|| anyhow!("uid label not set"))?
        .to_string();
    assert_eq!(uid.len(), 6);
    assert_eq!(stored.metadata.label(ACCOUNT_ID_LABEL), Some(FAKE_ACCOUNT_ID));
    assert_eq!(stored.status.state, Some(FederatedAccessState::Ready));

    let role_name = format!("network-mgmt-{}", uid);
    assert_eq!(
        stored.status.console_url.as_deref(),
        Some(
            format!(
                "https://signin.aws.amazon.com/switchrole?account={}&roleName={}",
                FAKE_ACCOUNT_ID, role_name
            )
            .as_str()
        )
    );
    assert_eq!(h.cloud.role_names(), vec![role_name.clone()]);
    assert_eq!(
        h.cloud.local_policy_names(),
        vec![format!("network-mgmt-policy-{}", uid)]
    );
    assert!(
        h.cloud
            .trust_policy(&role_name)
            .is_some_and(|trust| trust.contains(CUSTOMER_ARN))
    );
    assert_eq!(h.clients.requests(), vec!["secret:aws-account-operator/byoc-credentials"]);

    // terminal: nothing more happens
    h.cloud.clear_calls();
    h.reconcile().await?;
    assert!(h.cloud.calls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_provisioning_twice_replaces_instead_of_duplicating() -> anyhow::Result<()> {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();
    h.reconcile().await?;
    let uid = h.uid();

    // a pass that crashed before writing status runs again
    let mut access = h.stored();
    access.status = FederatedAccessStatus::default();
    h.accesses.update_status(&access).await?;
    h.reconcile().await?;

    let role_name = format!("network-mgmt-{}", uid);
    let policy_name = format!("network-mgmt-policy-{}", uid);
    assert_eq!(h.uid(), uid);
    assert_eq!(h.cloud.role_names(), vec![role_name.clone()]);
    assert_eq!(h.cloud.local_policy_names(), vec![policy_name.clone()]);
    assert_eq!(
        h.cloud.attached_policy_arns(&role_name),
        vec![
            "arn:aws:iam::aws:policy/ReadOnlyAccess".to_string(),
            format!("arn:aws:iam::{}:policy/{}", FAKE_ACCOUNT_ID, policy_name),
        ]
    );
    assert_eq!(h.stored().status.state, Some(FederatedAccessState::Ready));
    Ok(())
}

#[tokio::test]
async fn test_missing_template_fails_the_request() {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.templates
        .delete(&ResourceKey::new(NAMESPACE, TEMPLATE))
        .unwrap();
    h.insert_request();

    assert_eq!(h.reconcile().await.unwrap(), Outcome::Done);

    let stored = h.stored();
    assert_eq!(stored.status.state, Some(FederatedAccessState::Failed));
    let failed = stored
        .condition(FederatedAccessConditionType::Failed)
        .unwrap();
    assert_eq!(failed.reason, REASON_ROLE_NOT_FOUND);
    assert_eq!(failed.message, "Requested role does not exist");
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_template_fails_the_request() {
    let h = Harness::new(&["ReadOnlyAccess"]);
    let key = ResourceKey::new(NAMESPACE, TEMPLATE);
    let mut template = h.templates.peek(&key).unwrap();
    template.status.state = FederatedRoleState::Invalid;
    h.templates.insert(template);
    h.insert_request();

    h.reconcile().await.unwrap();

    let stored = h.stored();
    assert_eq!(stored.status.state, Some(FederatedAccessState::Failed));
    assert_eq!(
        stored
            .condition(FederatedAccessConditionType::Failed)
            .unwrap()
            .reason,
        REASON_ROLE_INVALID
    );
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn test_identity_failure_is_recorded_and_surfaced() {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();
    h.cloud.fail_next(
        "GetCallerIdentity",
        CloudError::api(codes::ACCESS_DENIED, "bad credentials"),
    );

    let result = h.reconcile().await;
    assert!(matches!(result, Err(CoreError::Cloud(_))));

    let stored = h.stored();
    assert_eq!(stored.status.state, Some(FederatedAccessState::Failed));
    let failed = stored
        .condition(FederatedAccessConditionType::Failed)
        .unwrap();
    assert_eq!(failed.reason, REASON_IDENTITY_FAILED);
    assert_eq!(failed.message, "Failed to get account ID information");
    assert!(h.cloud.calls_to("CreateRole").is_empty());
}

#[tokio::test]
async fn test_partial_attachment_is_undone() {
    let h = Harness::new(&["ReadOnlyAccess", "NoSuchManagedPolicy"]);
    h.insert_request();

    assert_eq!(h.reconcile().await.unwrap(), Outcome::Done);

    let uid = h.uid();
    let stored = h.stored();
    assert_eq!(stored.status.state, Some(FederatedAccessState::Failed));
    assert_eq!(
        stored
            .condition(FederatedAccessConditionType::Failed)
            .unwrap()
            .reason,
        REASON_ATTACH_FAILED
    );
    assert!(
        h.cloud
            .attached_policy_arns(&format!("network-mgmt-{}", uid))
            .is_empty()
    );
}

#[tokio::test]
async fn test_deletion_removes_everything() -> anyhow::Result<()> {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();
    h.reconcile().await?;
    let uid = h.uid();
    h.cloud.seed_policy("unrelated-policy");

    assert!(!h.accesses.delete(&h.request_key())?);
    h.reconcile().await?;

    assert!(h.accesses.peek(&h.request_key()).is_none());
    assert!(h.cloud.role_names().is_empty());
    assert_eq!(h.cloud.local_policy_names(), vec!["unrelated-policy"]);
    assert_eq!(
        h.cloud.assumed_roles(),
        vec![format!(
            "arn:aws:iam::{}:role/OrganizationAccountAccessRole",
            FAKE_ACCOUNT_ID
        )]
    );
    assert!(!uid.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_deletion_after_template_removal_matches_by_uid() -> anyhow::Result<()> {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();
    h.reconcile().await?;
    h.cloud.seed_policy("unrelated-policy");

    h.templates.delete(&ResourceKey::new(NAMESPACE, TEMPLATE))?;
    h.accesses.delete(&h.request_key())?;
    h.reconcile().await?;

    assert!(h.accesses.peek(&h.request_key()).is_none());
    assert!(h.cloud.role_names().is_empty());
    assert_eq!(h.cloud.local_policy_names(), vec!["unrelated-policy"]);
    Ok(())
}

#[tokio::test]
async fn test_deletion_falls_back_to_byoc_admin_role() -> anyhow::Result<()> {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();
    h.reconcile().await?;
    let uid = h.uid();
    h.cloud.deny_assume_role("OrganizationAccountAccessRole");

    h.accesses.delete(&h.request_key())?;
    h.reconcile().await?;

    assert_eq!(
        h.cloud.assumed_roles(),
        vec![format!(
            "arn:aws:iam::{}:role/BYOCAdminAccess-{}",
            FAKE_ACCOUNT_ID, uid
        )]
    );
    assert!(h.cloud.role_names().is_empty());
    assert!(h.accesses.peek(&h.request_key()).is_none());
    Ok(())
}

#[tokio::test]
async fn test_deleting_unprovisioned_request_touches_nothing() {
    let h = Harness::new(&["ReadOnlyAccess"]);
    h.insert_request();
    h.accesses.delete(&h.request_key()).unwrap();

    h.reconcile().await.unwrap();

    assert!(h.accesses.peek(&h.request_key()).is_none());
    assert!(h.cloud.calls().is_empty());
    assert!(h.clients.requests().is_empty());
}

#[tokio::test]
async fn test_ready_request_without_account_label_cannot_be_torn_down() {
    let h = Harness::new(&["ReadOnlyAccess"]);
    let mut access = FederatedAccess::new(NAMESPACE, REQUEST, access_spec());
    access.metadata.add_finalizer(FINALIZER);
    access.metadata.set_label(UID_LABEL, "abc123");
    access.status.state = Some(FederatedAccessState::Ready);
    h.accesses.insert(access);
    h.accesses.delete(&h.request_key()).unwrap();

    let result = h.reconcile().await;

    match result {
        Err(CoreError::MissingLabel { label, .. }) => assert_eq!(label, ACCOUNT_ID_LABEL),
        other => panic!("unexpected result: {:?}", other),
    }
    // the finalizer stays until teardown succeeds
    assert!(h.stored().metadata.has_finalizer(FINALIZER));
    assert!(h.cloud.calls().is_empty());
}
