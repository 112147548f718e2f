//! Owner tag validation

use super::ValidationError;
use crate::account::{OWNER_TAG, tag_account};
use accountflow_cloud::OrganizationsApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    AlreadyTagged,
    Tagged,
    Retagged,
}

/// Check that the account's `owner` tag equals `expected_owner`, repairing
/// it when `tag_enabled`.
pub async fn validate_owner_tag<C: OrganizationsApi + ?Sized>(
    client: &C,
    account_id: &str,
    expected_owner: &str,
    tag_enabled: bool,
) -> Result<TagOutcome, ValidationError> {
    let tags = client.list_tags_for_resource(account_id).await?;
    let current = tags.iter().find(|t| t.key == OWNER_TAG).map(|t| t.value.clone());

    match current {
        Some(owner) if owner == expected_owner => Ok(TagOutcome::AlreadyTagged),
        Some(owner) => {
            if !tag_enabled {
                return Err(ValidationError::IncorrectOwnerTag {
                    found: owner,
                    expected: expected_owner.to_string(),
                });
            }
            tracing::info!(
                "Account {} owner tag is '{}', replacing with '{}'",
                account_id,
                owner,
                expected_owner
            );
            client
                .untag_resource(account_id, &[OWNER_TAG.to_string()])
                .await
                .map_err(ValidationError::AccountTagFailed)?;
            tag_account(client, account_id, expected_owner)
                .await
                .map_err(ValidationError::AccountTagFailed)?;
            Ok(TagOutcome::Retagged)
        }
        None => {
            if !tag_enabled {
                return Err(ValidationError::MissingOwnerTag);
            }
            tag_account(client, account_id, expected_owner)
                .await
                .map_err(ValidationError::AccountTagFailed)?;
            Ok(TagOutcome::Tagged)
        }
    }
}
