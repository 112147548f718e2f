//! Operator configuration
//!
//! The operator is configured through a flat string map (the data section of
//! the operator config map). The map is re-read at the start of every
//! reconciliation pass and the resulting [`OperatorConfig`] is passed by
//! value into the reconcilers.

use crate::error::{ConfigError, Result};
use accountflow_cloud::Partition;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const KEY_FEDRAMP: &str = "fedramp";
pub const KEY_MOVE_ACCOUNT: &str = "feature.validation_move_account";
pub const KEY_TAG_ACCOUNT: &str = "feature.validation_tag_account";
pub const KEY_ROOT_OU: &str = "root";
pub const KEY_SHARD_NAME: &str = "shard-name";
pub const KEY_EMAIL_DOMAIN: &str = "account-email-domain";
pub const KEY_CREATION_TIMEOUT: &str = "account-creation-timeout";
pub const MAX_RECONCILES_PREFIX: &str = "MaxConcurrentReconciles.";

/// Controllers that read a concurrency ceiling from the config map
pub const CONTROLLERS: &[&str] = &[
    "account",
    "accountvalidation",
    "awsfederatedaccountaccess",
    "awsfederatedrole",
];

pub const DEFAULT_CREATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Run against the GovCloud partition
    pub fedramp: bool,

    /// Let account validation move accounts into the pool OU
    pub move_account_enabled: bool,

    /// Let account validation repair the owner tag
    pub tag_account_enabled: bool,

    /// Id of the OU pool accounts must live under
    pub root_ou: Option<String>,

    /// Expected value of the `owner` tag
    pub shard_name: Option<String>,

    /// Domain used to derive the email of newly created accounts
    pub account_email_domain: Option<String>,

    /// How long an account may stay in `Creating` before it is failed
    pub account_creation_timeout: Duration,

    pub max_concurrent_reconciles: BTreeMap<String, usize>,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            fedramp: false,
            move_account_enabled: false,
            tag_account_enabled: false,
            root_ou: None,
            shard_name: None,
            account_email_domain: None,
            account_creation_timeout: DEFAULT_CREATION_TIMEOUT,
            max_concurrent_reconciles: BTreeMap::new(),
        }
    }
}

fn non_empty(data: &BTreeMap<String, String>, key: &str) -> Option<String> {
    data.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Feature flags default to off; a value that is not a bool disables the
/// feature instead of failing the pass.
fn feature_flag(data: &BTreeMap<String, String>, key: &str) -> bool {
    match data.get(key) {
        None => {
            tracing::info!("Feature flag '{}' not set - feature is disabled", key);
            false
        }
        Some(raw) => match raw.trim().parse::<bool>() {
            Ok(enabled) => {
                tracing::debug!("Feature flag '{}' = {}", key, enabled);
                enabled
            }
            Err(_) => {
                tracing::warn!(
                    "Could not parse feature flag '{}' ({:?}) - feature is disabled",
                    key,
                    raw
                );
                false
            }
        },
    }
}

impl OperatorConfig {
    /// Build the configuration from config map data.
    pub fn from_data(data: &BTreeMap<String, String>) -> Result<Self> {
        // fedramp is optional, but a present value must be a bool
        let fedramp = match data.get(KEY_FEDRAMP) {
            None => false,
            Some(raw) => raw
                .trim()
                .parse::<bool>()
                .map_err(|e| invalid(KEY_FEDRAMP, raw, e))?,
        };

        let account_creation_timeout = match data.get(KEY_CREATION_TIMEOUT) {
            None => DEFAULT_CREATION_TIMEOUT,
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| invalid(KEY_CREATION_TIMEOUT, raw, e))?,
        };

        let mut max_concurrent_reconciles = BTreeMap::new();
        for (key, raw) in data {
            if let Some(controller) = key.strip_prefix(MAX_RECONCILES_PREFIX) {
                let value = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| invalid(key, raw, e))?;
                max_concurrent_reconciles.insert(controller.to_string(), value);
            }
        }

        Ok(Self {
            fedramp,
            move_account_enabled: feature_flag(data, KEY_MOVE_ACCOUNT),
            tag_account_enabled: feature_flag(data, KEY_TAG_ACCOUNT),
            root_ou: non_empty(data, KEY_ROOT_OU),
            shard_name: non_empty(data, KEY_SHARD_NAME),
            account_email_domain: non_empty(data, KEY_EMAIL_DOMAIN),
            account_creation_timeout,
            max_concurrent_reconciles,
        })
    }

    pub fn partition(&self) -> Partition {
        Partition::from_fedramp(self.fedramp)
    }

    pub fn default_region(&self) -> &'static str {
        self.partition().default_region()
    }

    /// Concurrency ceiling for `controller`
    pub fn max_reconciles(&self, controller: &str) -> Result<usize> {
        self.max_concurrent_reconciles
            .get(controller)
            .copied()
            .ok_or_else(|| ConfigError::MissingMaxReconciles(controller.to_string()))
    }

    /// Controllers from [`CONTROLLERS`] without a configured ceiling
    pub fn missing_max_reconciles(&self) -> Vec<&'static str> {
        CONTROLLERS
            .iter()
            .copied()
            .filter(|c| !self.max_concurrent_reconciles.contains_key(*c))
            .collect()
    }
}
