//! Account reconciler
//!
//! One pass moves an account at most one step along
//! `None -> Creating -> Ready` (or `Failed`), handles claims on ready
//! accounts and initializes customer-supplied (BYOC) accounts.

use super::provisioning::{self, AccountCreationError};
use crate::error::{CoreError, Result};
use crate::finalizer::{self, FinalizerStep};
use crate::model::{Account, AccountConditionType, AccountState, ConditionStatus, ResourceKey};
use crate::reconcile::Outcome;
use crate::store::ResourceStore;
use accountflow_cloud::{
    ClientBuilder, CloudClient, CloudError, CreateAccountState, CreateAccountStatus,
};
use accountflow_config::OperatorConfig;
use accountflow_config::operator::KEY_EMAIL_DOMAIN;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Delay between status checks of an outstanding creation request
pub const CREATION_POLL_INTERVAL: Duration = Duration::from_secs(30);

const CREATING_REASON: &str = "Creating";
const CREATING_MESSAGE: &str = "Account is being created";

pub struct AccountReconciler {
    store: Arc<dyn ResourceStore<Account>>,
    clients: Arc<dyn ClientBuilder>,
}

impl AccountReconciler {
    pub fn new(store: Arc<dyn ResourceStore<Account>>, clients: Arc<dyn ClientBuilder>) -> Self {
        Self { store, clients }
    }

    pub async fn reconcile(&self, key: &ResourceKey, config: &OperatorConfig) -> Result<Outcome> {
        let Some(account) = self.store.get(key).await? else {
            tracing::debug!("Account {} not found, nothing to do", key);
            return Ok(Outcome::Done);
        };

        match finalizer::next_step(&account) {
            FinalizerStep::AddMarker => {
                finalizer::add_marker(self.store.as_ref(), &account).await?;
                return Ok(Outcome::Done);
            }
            FinalizerStep::Teardown => {
                if account.is_byoc_pending_deletion_with_finalizer() {
                    tracing::info!("Releasing BYOC account {}", key);
                } else {
                    tracing::info!("Releasing account {}", key);
                }
                finalizer::remove_marker(self.store.as_ref(), &account).await?;
                return Ok(Outcome::Done);
            }
            FinalizerStep::Released => return Ok(Outcome::Done),
            FinalizerStep::Proceed => {}
        }

        let now = Utc::now();
        let mut account = account;

        if account.is_ready_unclaimed_and_has_claim_link() {
            let claim = account.spec.claim_link.clone().unwrap_or_default();
            tracing::info!("Account {} claimed by {}", key, claim);
            account.status.claimed = true;
            account.set_condition(
                AccountConditionType::Claimed,
                ConditionStatus::True,
                "AccountClaimed",
                &format!("Account claimed by {}", claim),
                now,
            );
            self.store.update_status(&account).await?;
            return Ok(Outcome::Done);
        }

        if account.is_ready() || account.is_failed() {
            return Ok(Outcome::Done);
        }

        if account.is_unclaimed_and_is_creating()
            && account.creation_stuck(config.account_creation_timeout, now)
        {
            tracing::error!(
                "Account {} has been creating for longer than {}s",
                key,
                config.account_creation_timeout.as_secs()
            );
            account.status.create_request_id = None;
            account.transition(
                AccountState::Failed,
                "CreationTimeout",
                "Account creation did not finish in time",
                now,
            );
            self.store.update_status(&account).await?;
            return Ok(Outcome::Done);
        }

        if account.ready_for_initialization() {
            if account.is_byoc() && !account.has_state() {
                return self.initialize_byoc(account, now).await;
            }
            return self.poll_creation(account, config, now).await;
        }

        if account.is_unclaimed_and_has_no_state() {
            return self.start_creation(account, config, now).await;
        }

        Ok(Outcome::Done)
    }

    async fn initialize_byoc(&self, mut account: Account, now: DateTime<Utc>) -> Result<Outcome> {
        if account.has_aws_account_id() {
            tracing::info!("BYOC account {} is ready", account.metadata.key());
            account.transition(
                AccountState::Ready,
                "BYOCAccountReady",
                "Customer supplied account is ready",
                now,
            );
        } else {
            tracing::warn!("BYOC account {} has no AWS account id", account.metadata.key());
            account.transition(
                AccountState::Failed,
                "MissingAWSAccountID",
                "Customer supplied account has no AWS account id",
                now,
            );
        }
        self.store.update_status(&account).await?;
        Ok(Outcome::Done)
    }

    async fn start_creation(
        &self,
        mut account: Account,
        config: &OperatorConfig,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let email = account_email(&account, config)?;

        // Persist Creating before the external call; its probe time is the
        // reference for the creation timeout.
        account.transition(AccountState::Creating, CREATING_REASON, CREATING_MESSAGE, now);
        let account = self.store.update_status(&account).await?;

        let client = self.clients.operator_client(config.default_region()).await?;
        let result =
            provisioning::create_account(client.as_ref(), &account.metadata.name, &email).await;
        self.apply_creation_result(account, result, client.as_ref(), config, now)
            .await
    }

    async fn poll_creation(
        &self,
        account: Account,
        config: &OperatorConfig,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let client = self.clients.operator_client(config.default_region()).await?;
        if let Some(account_id) = account.spec.aws_account_id.clone().filter(|id| !id.is_empty()) {
            // created on an earlier pass that stopped before Ready
            tracing::info!(
                "Account {} already created as {}, finishing",
                account.metadata.key(),
                account_id
            );
            return self
                .finish_creation(account, &account_id, client.as_ref(), config, now)
                .await;
        }
        let result = match account.status.create_request_id.as_deref() {
            Some(request_id) => {
                provisioning::check_create_status(client.as_ref(), request_id).await
            }
            None => {
                // Creating was persisted but no request is on record
                let email = account_email(&account, config)?;
                provisioning::create_account(client.as_ref(), &account.metadata.name, &email).await
            }
        };
        self.apply_creation_result(account, result, client.as_ref(), config, now)
            .await
    }

    async fn apply_creation_result(
        &self,
        mut account: Account,
        result: std::result::Result<CreateAccountStatus, AccountCreationError>,
        client: &dyn CloudClient,
        config: &OperatorConfig,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        let key = account.metadata.key();
        match result {
            Ok(status) if status.state == CreateAccountState::Succeeded => {
                let account_id = status.account_id.clone().ok_or_else(|| {
                    CloudError::UnexpectedResponse(format!(
                        "creation request {} succeeded without an account id",
                        status.request_id
                    ))
                })?;
                tracing::info!("Account {} created as {}", key, account_id);

                account.spec.aws_account_id = Some(account_id.clone());
                let account = self.store.update(&account).await?;
                self.finish_creation(account, &account_id, client, config, now)
                    .await
            }
            Ok(status) => {
                tracing::debug!(
                    "Account {} creation still in progress (request {})",
                    key,
                    status.request_id
                );
                if account.status.create_request_id.as_deref() != Some(status.request_id.as_str()) {
                    account.status.create_request_id = Some(status.request_id);
                    self.store.update_status(&account).await?;
                }
                Ok(Outcome::RequeueAfter(CREATION_POLL_INTERVAL))
            }
            Err(AccountCreationError::AccountLimitExceeded) => {
                let err = AccountCreationError::AccountLimitExceeded;
                tracing::warn!("Account {} not created: {}", key, err);
                account.status.create_request_id = None;
                // a quota backoff restarts the creation timeout
                account.set_condition(
                    AccountConditionType::Creating,
                    ConditionStatus::True,
                    CREATING_REASON,
                    CREATING_MESSAGE,
                    now,
                );
                account.set_condition(
                    AccountConditionType::Pending,
                    ConditionStatus::True,
                    "AccountLimitExceeded",
                    &err.to_string(),
                    now,
                );
                self.store.update_status(&account).await?;
                let delay = err.retry_after().unwrap_or(CREATION_POLL_INTERVAL);
                Ok(Outcome::RequeueAfter(delay))
            }
            Err(err) => {
                tracing::error!("Account {} creation failed: {}", key, err);
                if matches!(err, AccountCreationError::FailedCreateAccount(_))
                    && account.status.create_request_id.is_some()
                {
                    // the request is dead; the next pass submits a new one
                    account.status.create_request_id = None;
                    self.store.update_status(&account).await?;
                }
                Err(CoreError::AccountCreation(err))
            }
        }
    }

    /// Tag the created account with its owner and mark it Ready. Safe to
    /// repeat; a tagging failure leaves the account in Creating with its id
    /// recorded.
    async fn finish_creation(
        &self,
        mut account: Account,
        account_id: &str,
        client: &dyn CloudClient,
        config: &OperatorConfig,
        now: DateTime<Utc>,
    ) -> Result<Outcome> {
        if let Some(owner) = config.shard_name.as_deref() {
            provisioning::tag_account(client, account_id, owner).await?;
        }

        account.status.create_request_id = None;
        account.transition(AccountState::Ready, "AccountCreated", "Account created", now);
        self.store.update_status(&account).await?;
        Ok(Outcome::Done)
    }
}

fn account_email(account: &Account, config: &OperatorConfig) -> Result<String> {
    let domain = config
        .account_email_domain
        .as_deref()
        .ok_or_else(|| CoreError::Config(format!("'{}' is not set", KEY_EMAIL_DOMAIN)))?;
    Ok(format!("{}@{}", account.metadata.name, domain))
}
