//! Account state predicates
//!
//! Pure functions of an [`Account`] snapshot. The account reconciler picks
//! its next step from these and nothing else.

use crate::finalizer::FINALIZER;
use crate::model::{Account, AccountConditionType, AccountState, IAM_USER_ID_LABEL};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Role assumed in pool-created accounts
pub const ORGANIZATION_ACCESS_ROLE: &str = "OrganizationAccountAccessRole";

/// Prefix of the support role in customer-supplied accounts
pub const MANAGED_SUPPORT_ROLE: &str = "ManagedOpenShift-Support";

impl Account {
    pub fn has_state(&self) -> bool {
        self.status.state.is_some()
    }

    pub fn is_pending_verification(&self) -> bool {
        self.status.state == Some(AccountState::PendingVerification)
    }

    pub fn is_ready(&self) -> bool {
        self.status.state == Some(AccountState::Ready)
    }

    pub fn is_failed(&self) -> bool {
        self.status.state == Some(AccountState::Failed)
    }

    pub fn is_creating(&self) -> bool {
        self.status.state == Some(AccountState::Creating)
    }

    pub fn is_claimed(&self) -> bool {
        self.status.claimed
    }

    pub fn has_claim_link(&self) -> bool {
        self.spec.claim_link.as_deref().is_some_and(|l| !l.is_empty())
    }

    pub fn is_pending_deletion(&self) -> bool {
        self.metadata.is_being_deleted()
    }

    pub fn is_byoc(&self) -> bool {
        self.spec.byoc
    }

    pub fn has_finalizer(&self) -> bool {
        self.metadata.has_finalizer(FINALIZER)
    }

    pub fn has_aws_account_id(&self) -> bool {
        self.spec.aws_account_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn has_support_case_id(&self) -> bool {
        self.status
            .support_case_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    pub fn is_owned_by_account_pool(&self) -> bool {
        self.spec.account_pool.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn is_ready_unclaimed_and_has_claim_link(&self) -> bool {
        self.is_ready() && !self.is_claimed() && self.has_claim_link()
    }

    pub fn is_byoc_pending_deletion_with_finalizer(&self) -> bool {
        self.is_byoc() && self.is_pending_deletion() && self.has_finalizer()
    }

    pub fn is_byoc_and_not_ready(&self) -> bool {
        self.is_byoc() && !self.is_ready()
    }

    pub fn ready_for_initialization(&self) -> bool {
        (self.is_byoc() && !self.has_state()) || (!self.is_claimed() && self.is_creating())
    }

    pub fn is_unclaimed_and_has_no_state(&self) -> bool {
        !self.is_claimed() && !self.has_state()
    }

    pub fn is_unclaimed_and_is_creating(&self) -> bool {
        !self.is_claimed() && self.is_creating()
    }

    /// The Creating condition was last probed more than `threshold` ago.
    pub fn creation_stuck(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        let Some(condition) = self.condition(AccountConditionType::Creating) else {
            return false;
        };
        let Ok(threshold) = chrono::Duration::from_std(threshold) else {
            return false;
        };
        now.signed_duration_since(condition.last_probe_time) > threshold
    }

    /// Role to assume when acting inside this account
    pub fn assume_role_name(&self) -> String {
        if self.is_byoc() {
            let user_id = self.metadata.label(IAM_USER_ID_LABEL).unwrap_or_default();
            format!("{}-{}", MANAGED_SUPPORT_ROLE, user_id)
        } else {
            ORGANIZATION_ACCESS_ROLE.to_string()
        }
    }
}
