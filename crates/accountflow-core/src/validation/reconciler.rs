use super::ValidationError;
use super::ou::{self, MoveOutcome};
use super::tags;
use crate::error::{CoreError, Result};
use crate::model::{Account, ResourceKey};
use crate::reconcile::Outcome;
use crate::store::ResourceStore;
use accountflow_cloud::ClientBuilder;
use accountflow_config::OperatorConfig;
use std::sync::Arc;
use std::time::Duration;

/// Delay before retrying a failed OU move
pub const MOVE_RETRY_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Keeps ready pool accounts in the pool OU with the right owner tag.
///
/// Checks run in a fixed order and the first failure ends the pass:
/// origin, account id, OU placement, owner tag.
pub struct AccountValidationReconciler {
    store: Arc<dyn ResourceStore<Account>>,
    clients: Arc<dyn ClientBuilder>,
}

fn validate_origin(account: &Account) -> std::result::Result<(), ValidationError> {
    if account.is_byoc() {
        return Err(ValidationError::InvalidAccount(
            "customer supplied account".to_string(),
        ));
    }
    if !account.is_owned_by_account_pool() {
        return Err(ValidationError::InvalidAccount(
            "account is not owned by an account pool".to_string(),
        ));
    }
    if !account.is_ready() {
        return Err(ValidationError::InvalidAccount("account is not ready".to_string()));
    }
    Ok(())
}

impl AccountValidationReconciler {
    pub fn new(store: Arc<dyn ResourceStore<Account>>, clients: Arc<dyn ClientBuilder>) -> Self {
        Self { store, clients }
    }

    pub async fn reconcile(&self, key: &ResourceKey, config: &OperatorConfig) -> Result<Outcome> {
        let Some(account) = self.store.get(key).await? else {
            return Ok(Outcome::Done);
        };

        match self.validate(&account, config).await {
            Ok(()) => Ok(Outcome::Done),
            Err(CoreError::Validation(err)) => match err {
                ValidationError::InvalidAccount(reason) => {
                    tracing::debug!("Skipping validation of {}: {}", key, reason);
                    Ok(Outcome::Done)
                }
                ValidationError::MissingAwsAccount => {
                    tracing::info!("Account {} has no AWS account id yet", key);
                    Ok(Outcome::Done)
                }
                ValidationError::AccountMoveFailed(cause) => {
                    tracing::warn!("Account {} could not be moved, retrying: {}", key, cause);
                    Ok(Outcome::RequeueAfter(MOVE_RETRY_INTERVAL))
                }
                other => {
                    tracing::error!("Account {} failed validation: {}", key, other);
                    Err(CoreError::Validation(other))
                }
            },
            Err(other) => Err(other),
        }
    }

    async fn validate(&self, account: &Account, config: &OperatorConfig) -> Result<()> {
        validate_origin(account)?;
        let account_id = account
            .spec
            .aws_account_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingAwsAccount)?;

        let client = self.clients.operator_client(config.default_region()).await?;

        match config.root_ou.as_deref() {
            Some(root_ou) => {
                let outcome = ou::move_if_needed(
                    client.as_ref(),
                    account_id,
                    root_ou,
                    config.move_account_enabled,
                )
                .await?;
                if let MoveOutcome::DryRun { from } = outcome {
                    tracing::info!(
                        "Would move account {} from {} to {}",
                        account_id,
                        from,
                        root_ou
                    );
                }
            }
            None => tracing::debug!("No pool OU configured, skipping OU validation"),
        }

        match config.shard_name.as_deref() {
            Some(shard) => {
                tags::validate_owner_tag(
                    client.as_ref(),
                    account_id,
                    shard,
                    config.tag_account_enabled,
                )
                .await?;
            }
            None => tracing::debug!("No shard name configured, skipping tag validation"),
        }

        Ok(())
    }
}
