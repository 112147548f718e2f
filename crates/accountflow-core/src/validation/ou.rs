//! Organizational unit placement

use super::ValidationError;
use accountflow_cloud::{OrganizationsApi, Parent};

/// Upper bound for the parent walk. Organizations nest at most five OUs
/// below the root, so six hops always reach the root of a valid tree.
pub const MAX_OU_DEPTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    AlreadyInPlace,
    Moved { from: String },
    /// Moving is disabled; the move that would have happened
    DryRun { from: String },
}

async fn single_parent<C: OrganizationsApi + ?Sized>(
    client: &C,
    child_id: &str,
) -> Result<Option<Parent>, ValidationError> {
    let mut parents = client.list_parents(child_id).await?;
    match parents.len() {
        0 => Ok(None),
        1 => Ok(parents.pop()),
        count => Err(ValidationError::MultipleParents {
            id: child_id.to_string(),
            count,
        }),
    }
}

/// Walk up from `account_id` until `is_target` accepts a parent.
///
/// Returns `Ok(false)` when the walk reaches a node without parents.
pub async fn is_in_target_ou<C, F>(
    client: &C,
    account_id: &str,
    is_target: F,
) -> Result<bool, ValidationError>
where
    C: OrganizationsApi + ?Sized,
    F: Fn(&Parent) -> bool,
{
    let mut current = account_id.to_string();
    for _ in 0..MAX_OU_DEPTH {
        let Some(parent) = single_parent(client, &current).await? else {
            return Ok(false);
        };
        if is_target(&parent) {
            return Ok(true);
        }
        current = parent.id;
    }
    Err(ValidationError::HierarchyTooDeep {
        account_id: account_id.to_string(),
        depth: MAX_OU_DEPTH,
    })
}

/// Make sure `account_id` lives somewhere below `target_ou`, moving it
/// directly under `target_ou` when it does not.
pub async fn move_if_needed<C: OrganizationsApi + ?Sized>(
    client: &C,
    account_id: &str,
    target_ou: &str,
    move_enabled: bool,
) -> Result<MoveOutcome, ValidationError> {
    if is_in_target_ou(client, account_id, |p| p.id == target_ou).await? {
        tracing::debug!("Account {} is already under {}", account_id, target_ou);
        return Ok(MoveOutcome::AlreadyInPlace);
    }

    let current = single_parent(client, account_id)
        .await?
        .ok_or_else(|| ValidationError::NoParent(account_id.to_string()))?;

    if !move_enabled {
        tracing::info!(
            "Account {} is not under {} (currently {}); moving is disabled",
            account_id,
            target_ou,
            current.id
        );
        return Ok(MoveOutcome::DryRun { from: current.id });
    }

    client
        .move_account(account_id, &current.id, target_ou)
        .await
        .map_err(|e| {
            tracing::error!("Failed to move account {} to {}: {}", account_id, target_ou, e);
            ValidationError::AccountMoveFailed(e)
        })?;
    tracing::info!("Moved account {} from {} to {}", account_id, current.id, target_ou);
    Ok(MoveOutcome::Moved { from: current.id })
}
