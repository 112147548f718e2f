//! Account reconciler passes against the in-memory cloud and store

use accountflow_cloud::testing::{FakeClientBuilder, FakeCloud};
use accountflow_cloud::{CloudError, CreateAccountState, Tag, codes};
use accountflow_config::OperatorConfig;
use accountflow_core::account::AccountCreationError;
use accountflow_core::account::reconciler::CREATION_POLL_INTERVAL;
use accountflow_core::{
    Account, AccountConditionType, AccountReconciler, AccountState, ConditionStatus, CoreError,
    FINALIZER, MemoryStore, Outcome, ResourceKey,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE: &str = "aws-account-operator";

struct Harness {
    store: Arc<MemoryStore<Account>>,
    cloud: FakeCloud,
    reconciler: AccountReconciler,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let cloud = FakeCloud::new();
    let clients = Arc::new(FakeClientBuilder::new(cloud.clone()));
    let reconciler = AccountReconciler::new(store.clone(), clients);
    Harness {
        store,
        cloud,
        reconciler,
    }
}

fn config() -> OperatorConfig {
    OperatorConfig {
        account_email_domain: Some("example.com".to_string()),
        shard_name: Some("hive-stage-01".to_string()),
        ..Default::default()
    }
}

/// An account that already went through its finalizer pass
fn tracked_account(name: &str) -> Account {
    let mut account = Account::new(NAMESPACE, name);
    account.metadata.add_finalizer(FINALIZER);
    account
}

fn key(name: &str) -> ResourceKey {
    ResourceKey::new(NAMESPACE, name)
}

#[tokio::test]
async fn test_first_pass_only_adds_finalizer() {
    let h = harness();
    h.store.insert(Account::new(NAMESPACE, "osd-creds-mgmt-aaaaaa"));

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-aaaaaa"), &config())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Done);
    let stored = h.store.peek(&key("osd-creds-mgmt-aaaaaa")).unwrap();
    assert!(stored.metadata.has_finalizer(FINALIZER));
    assert_eq!(stored.status.state, None);
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn test_new_account_is_created_tagged_and_ready() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-aaaaaa"));

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-aaaaaa"), &config())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);

    let stored = h.store.peek(&key("osd-creds-mgmt-aaaaaa")).unwrap();
    assert_eq!(stored.status.state, Some(AccountState::Ready));
    assert_eq!(stored.spec.aws_account_id.as_deref(), Some("200000000001"));
    assert_eq!(stored.status.create_request_id, None);
    assert!(stored.condition(AccountConditionType::Creating).is_some());
    assert!(stored.condition(AccountConditionType::Ready).is_some());

    assert_eq!(
        h.cloud.calls_to("CreateAccount"),
        vec!["CreateAccount osd-creds-mgmt-aaaaaa"]
    );
    assert_eq!(
        h.cloud.tags_of("200000000001"),
        vec![Tag::new("owner", "hive-stage-01")]
    );
}

#[tokio::test]
async fn test_in_progress_creation_is_rechecked_not_resubmitted() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-bbbbbb"));
    h.cloud
        .set_create_account_outcome(CreateAccountState::InProgress, None);

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-bbbbbb"), &config())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(CREATION_POLL_INTERVAL));

    let stored = h.store.peek(&key("osd-creds-mgmt-bbbbbb")).unwrap();
    assert_eq!(stored.status.state, Some(AccountState::Creating));
    assert_eq!(stored.status.create_request_id.as_deref(), Some("car-00000001"));

    // the request completes
    h.cloud
        .set_create_account_outcome(CreateAccountState::Succeeded, None);
    h.cloud.clear_calls();

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-bbbbbb"), &config())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);
    assert!(h.cloud.calls_to("CreateAccount").is_empty());
    assert_eq!(
        h.cloud.calls_to("DescribeCreateAccountStatus"),
        vec!["DescribeCreateAccountStatus car-00000001"]
    );

    let stored = h.store.peek(&key("osd-creds-mgmt-bbbbbb")).unwrap();
    assert_eq!(stored.status.state, Some(AccountState::Ready));
}

#[tokio::test]
async fn test_account_limit_is_recorded_and_requeued() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-cccccc"));
    h.cloud.fail_next(
        "CreateAccount",
        CloudError::api(codes::CONSTRAINT_VIOLATION, "too many accounts"),
    );

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-cccccc"), &config())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::RequeueAfter(Duration::from_secs(600)));

    let stored = h.store.peek(&key("osd-creds-mgmt-cccccc")).unwrap();
    let pending = stored.condition(AccountConditionType::Pending).unwrap();
    assert_eq!(pending.reason, "AccountLimitExceeded");
    assert_eq!(stored.status.create_request_id, None);
}

#[tokio::test]
async fn test_throttled_creation_is_surfaced() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-dddddd"));
    h.cloud.fail_next(
        "CreateAccount",
        CloudError::api("ThrottlingException", "Rate exceeded"),
    );

    let result = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-dddddd"), &config())
        .await;
    assert!(matches!(
        result,
        Err(CoreError::AccountCreation(AccountCreationError::TooManyRequests))
    ));
    let stored = h.store.peek(&key("osd-creds-mgmt-dddddd")).unwrap();
    assert!(stored.condition(AccountConditionType::Pending).is_none());

    // the retry submits the request again
    h.reconciler
        .reconcile(&key("osd-creds-mgmt-dddddd"), &config())
        .await
        .unwrap();
    assert_eq!(h.cloud.calls_to("CreateAccount").len(), 2);
    assert_eq!(
        h.store.peek(&key("osd-creds-mgmt-dddddd")).unwrap().status.state,
        Some(AccountState::Ready)
    );
}

#[tokio::test]
async fn test_failed_tagging_resumes_without_second_account() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-iiiiii"));
    h.cloud.fail_next(
        "TagResource",
        CloudError::api(codes::SERVICE_EXCEPTION, "try again"),
    );

    let result = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-iiiiii"), &config())
        .await;
    assert!(matches!(result, Err(CoreError::Cloud(_))));

    let stored = h.store.peek(&key("osd-creds-mgmt-iiiiii")).unwrap();
    assert_eq!(stored.status.state, Some(AccountState::Creating));
    assert_eq!(stored.spec.aws_account_id.as_deref(), Some("200000000001"));

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-iiiiii"), &config())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);

    let stored = h.store.peek(&key("osd-creds-mgmt-iiiiii")).unwrap();
    assert_eq!(stored.status.state, Some(AccountState::Ready));
    assert_eq!(stored.spec.aws_account_id.as_deref(), Some("200000000001"));
    assert_eq!(h.cloud.calls_to("CreateAccount").len(), 1);
    assert_eq!(
        h.cloud.tags_of("200000000001"),
        vec![Tag::new("owner", "hive-stage-01")]
    );
}

#[tokio::test]
async fn test_quota_backoff_restarts_creation_timeout() {
    let h = harness();
    let mut account = tracked_account("osd-creds-mgmt-jjjjjj");
    account.transition(
        AccountState::Creating,
        "Creating",
        "Account is being created",
        Utc::now() - chrono::Duration::minutes(25),
    );
    h.store.insert(account);
    h.cloud.fail_next(
        "CreateAccount",
        CloudError::api(codes::CONSTRAINT_VIOLATION, "too many accounts"),
    );

    let before = Utc::now();
    h.reconciler
        .reconcile(&key("osd-creds-mgmt-jjjjjj"), &config())
        .await
        .unwrap();

    let stored = h.store.peek(&key("osd-creds-mgmt-jjjjjj")).unwrap();
    let creating = stored.condition(AccountConditionType::Creating).unwrap();
    assert!(creating.last_probe_time >= before);
    assert_eq!(stored.status.state, Some(AccountState::Creating));
    assert!(!stored.creation_stuck(
        Duration::from_secs(30 * 60),
        Utc::now() + chrono::Duration::minutes(10)
    ));
}

#[tokio::test]
async fn test_stuck_creation_fails_without_provider_calls() {
    let h = harness();
    let mut account = tracked_account("osd-creds-mgmt-eeeeee");
    account.transition(
        AccountState::Creating,
        "Creating",
        "Account is being created",
        Utc::now() - chrono::Duration::minutes(31),
    );
    account.status.create_request_id = Some("car-00000042".to_string());
    h.store.insert(account);

    let outcome = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-eeeeee"), &config())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);

    let stored = h.store.peek(&key("osd-creds-mgmt-eeeeee")).unwrap();
    assert_eq!(stored.status.state, Some(AccountState::Failed));
    assert_eq!(
        stored.condition(AccountConditionType::Failed).unwrap().reason,
        "CreationTimeout"
    );
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn test_ready_account_with_claim_link_becomes_claimed_once() {
    let h = harness();
    let mut account = tracked_account("osd-creds-mgmt-ffffff");
    account.status.state = Some(AccountState::Ready);
    account.spec.claim_link = Some("claim-1".to_string());
    h.store.insert(account);

    for _ in 0..2 {
        h.reconciler
            .reconcile(&key("osd-creds-mgmt-ffffff"), &config())
            .await
            .unwrap();
    }

    let stored = h.store.peek(&key("osd-creds-mgmt-ffffff")).unwrap();
    assert!(stored.status.claimed);
    let claimed: Vec<_> = stored
        .status
        .conditions
        .iter()
        .filter(|c| c.condition_type == AccountConditionType::Claimed)
        .collect();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, ConditionStatus::True);
}

#[tokio::test]
async fn test_byoc_initialization() {
    let h = harness();

    let mut with_id = tracked_account("byoc-with-id");
    with_id.spec.byoc = true;
    with_id.status.claimed = true;
    with_id.spec.aws_account_id = Some("123456789012".to_string());
    h.store.insert(with_id);

    let mut without_id = tracked_account("byoc-without-id");
    without_id.spec.byoc = true;
    without_id.status.claimed = true;
    h.store.insert(without_id);

    for name in ["byoc-with-id", "byoc-without-id"] {
        h.reconciler.reconcile(&key(name), &config()).await.unwrap();
    }

    assert_eq!(
        h.store.peek(&key("byoc-with-id")).unwrap().status.state,
        Some(AccountState::Ready)
    );
    assert_eq!(
        h.store.peek(&key("byoc-without-id")).unwrap().status.state,
        Some(AccountState::Failed)
    );
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn test_missing_email_domain_is_a_config_error() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-gggggg"));

    let result = h
        .reconciler
        .reconcile(&key("osd-creds-mgmt-gggggg"), &OperatorConfig::default())
        .await;
    assert!(matches!(result, Err(CoreError::Config(_))));
    assert!(h.cloud.calls().is_empty());
}

#[tokio::test]
async fn test_deletion_releases_finalizer() {
    let h = harness();
    h.store.insert(tracked_account("osd-creds-mgmt-hhhhhh"));
    assert!(!h.store.delete(&key("osd-creds-mgmt-hhhhhh")).unwrap());

    h.reconciler
        .reconcile(&key("osd-creds-mgmt-hhhhhh"), &config())
        .await
        .unwrap();

    assert!(h.store.peek(&key("osd-creds-mgmt-hhhhhh")).is_none());
}
